use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::{Config, DEV_JWT_SECRET};
use crate::error::AppError;
use crate::services::{BackupCodeService, SecretVault, SessionService, TotpService};

/// 認証コアの共有状態
///
/// 外部のaxumルーターが State として全ハンドラーで共有する。
/// Clone は必須（axum が内部で clone するため）。
/// 全サービスは不変設定のみに依存する純粋・ステートレスな計算のため、
/// 並行リクエスト間でロックは不要。
#[derive(Clone)]
pub struct AuthState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// TOTPシークレット保管用の暗号化サービス
    pub vault: SecretVault,
    /// TOTPサービス
    pub totp_service: TotpService,
    /// バックアップコードサービス
    pub backup_code_service: BackupCodeService,
    /// セッショントークンサービス
    pub session_service: SessionService,
}

impl AuthState {
    /// 新しい AuthState を作成
    ///
    /// 暗号化キーの検証はここ（起動時）で行われ、
    /// 不正な設定は `AppError::Config` として即座に失敗する
    pub fn new(config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);

        if config.jwt_secret.expose_secret() == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET が開発用フォールバック値です。本番環境では必ず設定してください");
        }

        let vault = SecretVault::new(config.encryption_key.expose_secret())?;
        let totp_service = TotpService::new(
            config.totp_issuer.clone(),
            config.totp_step_seconds,
            config.totp_window_steps,
        );
        let session_service = SessionService::new(config.jwt_secret.expose_secret());

        Ok(Self {
            config,
            vault,
            totp_service,
            backup_code_service: BackupCodeService,
            session_service,
        })
    }
}
