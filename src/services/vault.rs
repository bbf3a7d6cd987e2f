use aes_gcm::{
    AesGcm, KeyInit, Nonce,
    aead::{Aead, OsRng, generic_array::typenum::U16},
    aes::Aes256,
};
use data_encoding::HEXLOWER_PERMISSIVE;
use rand::RngCore;

use crate::error::AppError;

/// AES-256-GCM（128ビットIV）
type Aes256GcmWithIv16 = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_HEX_LEN: usize = 64;

/// TOTPシークレット保管用の暗号化サービス
///
/// # Security
/// - シークレットはAES-256-GCMで暗号化してDB保存
/// - 認証タグ検証失敗は `AppError::Integrity` として必ず伝播させる
///   （改ざんされた平文を返すことは絶対にない）
#[derive(Clone)]
pub struct SecretVault {
    encryption_key: [u8; 32],
}

impl SecretVault {
    /// 新しい SecretVault を作成
    ///
    /// # Arguments
    /// * `encryption_key_hex` - hexエンコードされた32バイトの暗号化キー（64文字）
    ///
    /// キーが欠落・不正な場合は致命的な設定ミスとして `AppError::Config` を返す
    pub fn new(encryption_key_hex: &str) -> Result<Self, AppError> {
        if encryption_key_hex.len() != KEY_HEX_LEN {
            tracing::error!(
                expected = KEY_HEX_LEN,
                actual = encryption_key_hex.len(),
                "暗号化キーの長さが不正"
            );
            return Err(AppError::Config(
                "encryption key must be 64 hex characters (32 bytes)".to_string(),
            ));
        }

        let key_bytes = HEXLOWER_PERMISSIVE
            .decode(encryption_key_hex.as_bytes())
            .map_err(|_| {
                tracing::error!("暗号化キーのhexデコードエラー");
                AppError::Config("encryption key must be valid hex".to_string())
            })?;

        let mut encryption_key = [0u8; 32];
        encryption_key.copy_from_slice(&key_bytes);

        Ok(Self { encryption_key })
    }

    /// シークレットをAES-256-GCMで暗号化
    ///
    /// 暗号化のたびに16バイトのランダムIVを生成する。
    ///
    /// # Returns
    /// `iv:ciphertext:authTag` 形式（各セグメントはhexエンコード）。
    /// IVと認証タグが暗号文と一緒に保存されるため、別カラムは不要。
    pub fn encrypt(&self, secret: &str) -> Result<String, AppError> {
        let cipher = Aes256GcmWithIv16::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // encrypt は 暗号文 + 16バイト認証タグ を返す
        let sealed = cipher.encrypt(nonce, secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレット暗号化エラー");
            AppError::Internal(anyhow::anyhow!("encryption error"))
        })?;

        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            HEXLOWER_PERMISSIVE.encode(&iv),
            HEXLOWER_PERMISSIVE.encode(ciphertext),
            HEXLOWER_PERMISSIVE.encode(tag),
        ))
    }

    /// 暗号化されたシークレットを復号
    ///
    /// 形式不正・hexデコード失敗・認証タグ検証失敗はすべて
    /// `AppError::Integrity`（改ざんまたはキー不一致）
    pub fn decrypt(&self, blob: &str) -> Result<String, AppError> {
        let segments: Vec<&str> = blob.split(':').collect();
        if segments.len() != 3 {
            tracing::error!(segments = segments.len(), "暗号化データの形式が不正");
            return Err(AppError::Integrity);
        }

        let iv = decode_hex_segment(segments[0])?;
        let ciphertext = decode_hex_segment(segments[1])?;
        let tag = decode_hex_segment(segments[2])?;

        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            tracing::error!(
                iv_len = iv.len(),
                tag_len = tag.len(),
                "IVまたは認証タグの長さが不正"
            );
            return Err(AppError::Integrity);
        }

        let cipher = Aes256GcmWithIv16::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let nonce = Nonce::from_slice(&iv);
        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = cipher.decrypt(nonce, sealed.as_ref()).map_err(|_| {
            // 認証タグ不一致。詳細はログに残さない（キー・暗号文の漏洩防止）
            tracing::error!("シークレット復号エラー（改ざんまたはキー不一致）");
            AppError::Integrity
        })?;

        String::from_utf8(plaintext).map_err(|e| {
            tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
            AppError::Internal(anyhow::anyhow!("invalid utf8 after decryption"))
        })
    }
}

/// hexセグメントをデコード（失敗は整合性エラー扱い）
fn decode_hex_segment(segment: &str) -> Result<Vec<u8>, AppError> {
    HEXLOWER_PERMISSIVE.decode(segment.as_bytes()).map_err(|_| {
        tracing::error!("暗号化データのhexデコードエラー");
        AppError::Integrity
    })
}
