use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    // セッショントークン設定
    /// JWT署名キー（HMAC-SHA256）
    ///
    /// 未設定の場合は開発用フォールバック値が使われる。
    /// 本番環境では必ず明示的に設定すること。
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: SecretBox<String>,

    // 2FA (TOTP) 設定
    /// TOTP発行者名（認証アプリに表示される）
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,
    /// TOTPタイムステップ（秒）
    #[serde(default = "default_totp_step_seconds")]
    pub totp_step_seconds: u64,
    /// TOTP検証で許容する前後のステップ数
    #[serde(default = "default_totp_window_steps")]
    pub totp_window_steps: u8,
    /// AES-256暗号化キー（hexエンコード、64文字 = 32バイト）
    pub encryption_key: SecretBox<String>,

    // セッションクッキー設定
    /// Secure属性を付与するか（本番環境では必ずtrue）
    #[serde(default)]
    pub session_cookie_secure: bool,
}

/// JWT_SECRET の開発用フォールバック値
///
/// `AuthState::new` がフォールバック使用時に警告ログを出力する
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

const DEFAULT_TOTP_ISSUER: &str = "App";
const DEFAULT_TOTP_STEP_SECONDS: u64 = 30;
const DEFAULT_TOTP_WINDOW_STEPS: u8 = 1;

fn default_jwt_secret() -> SecretBox<String> {
    SecretBox::new(Box::new(DEV_JWT_SECRET.to_string()))
}

fn default_totp_issuer() -> String {
    DEFAULT_TOTP_ISSUER.to_string()
}

fn default_totp_step_seconds() -> u64 {
    DEFAULT_TOTP_STEP_SECONDS
}

fn default_totp_window_steps() -> u8 {
    DEFAULT_TOTP_WINDOW_STEPS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
