use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use data_encoding::BASE32;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

use crate::error::AppError;

/// TOTPコードの桁数
const TOTP_DIGITS: usize = 6;
/// QRコードの最小サイズ（px）。低画質カメラでも読み取れるように大きめ
const QR_MIN_DIMENSION: u32 = 300;

/// TOTP (Time-based One-Time Password) サービス
///
/// # Security
/// - シークレット平文・提示コードはログに出力しない
/// - 検証失敗の理由（コード不一致か期限切れか）は呼び出し側に区別させない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    step_seconds: u64,
    window_steps: u8,
}

impl TotpService {
    /// 新しい TotpService を作成
    ///
    /// # Arguments
    /// * `issuer` - TOTP発行者名（アプリ名）
    /// * `step_seconds` - タイムステップ（通常30秒）
    /// * `window_steps` - 検証で許容する前後のステップ数（通常1 = ±30秒）
    pub fn new(issuer: String, step_seconds: u64, window_steps: u8) -> Self {
        Self {
            issuer,
            step_seconds,
            window_steps,
        }
    }

    /// 20バイトのランダムシークレットを生成し、Base32でエンコード
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE32.encode(&bytes)
    }

    /// 登録用 otpauth:// URI を構築
    ///
    /// 決定的な変換（乱数なし）。認証アプリがQRコード経由で取り込む形式:
    /// `otpauth://totp/{issuer}:{accountLabel}?secret={secret}&issuer={issuer}`
    pub fn build_enrollment_uri(
        &self,
        account_label: &str,
        secret: &str,
    ) -> Result<String, AppError> {
        let totp = self.create_totp(account_label, secret)?;
        Ok(totp.get_url())
    }

    /// URIをQRコードとしてレンダリング（PNG形式のdata URL）
    ///
    /// 300×300px以上・誤り訂正レベルH。画質の悪いカメラでも読み取れる
    pub fn render_qr_code(&self, uri: &str) -> Result<String, AppError> {
        let code = QrCode::with_error_correction_level(uri.as_bytes(), EcLevel::H).map_err(|e| {
            tracing::error!(error = ?e, "QRコード生成エラー");
            AppError::Internal(anyhow::anyhow!("qr code generation error"))
        })?;

        let img = code
            .render::<Luma<u8>>()
            .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
            .build();

        let mut cursor = Cursor::new(Vec::<u8>::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| {
                tracing::error!(error = ?e, "QRコードのPNGエンコードエラー");
                AppError::Internal(anyhow::anyhow!("qr png encoding error"))
            })?;

        Ok(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(cursor.into_inner())
        ))
    }

    /// TOTPコードを検証
    ///
    /// コード内の空白は除去してから比較する。
    /// 6桁の数字でないものはエラーではなく false を返す（検証面の統一）。
    ///
    /// # Note
    /// 前後 `window_steps` ステップの時間ウィンドウを許容（±30秒）
    pub fn verify(&self, secret: &str, presented_code: &str) -> Result<bool, AppError> {
        let current_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| {
                tracing::error!(error = ?e, "システム時刻取得エラー");
                AppError::Internal(anyhow::anyhow!("system time error"))
            })?
            .as_secs();

        self.verify_at(secret, presented_code, current_time)
    }

    /// 指定時刻でTOTPコードを検証（テストで境界時刻を決定的に扱うため分離）
    fn verify_at(&self, secret: &str, presented_code: &str, time: u64) -> Result<bool, AppError> {
        // 入力正規化: 空白を除去
        let code: String = presented_code
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        // 入力検証: コードは6桁の数字のみ
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.create_totp_for_verify(secret)?;

        // check は内部で skew を考慮して検証
        Ok(totp.check(&code, time))
    }

    /// TOTP オブジェクトを作成（URI構築用）
    fn create_totp(&self, account_label: &str, secret: &str) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
        })?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            self.window_steps,
            self.step_seconds,
            secret_bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }

    /// TOTP オブジェクトを作成（検証用）
    fn create_totp_for_verify(&self, secret: &str) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
        })?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            self.window_steps,
            self.step_seconds,
            secret_bytes,
            None,
            String::new(),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }
}
