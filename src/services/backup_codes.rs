use std::collections::HashSet;

use data_encoding::HEXUPPER;
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// 1ユーザーあたりのバックアップコード数
const BACKUP_CODE_COUNT: usize = 10;
/// コード1件あたりのランダムバイト数（hexで8文字になる）
const BACKUP_CODE_BYTES: usize = 4;

/// バックアップコード（リカバリーコード）サービス
///
/// # Security
/// - 平文コードは生成時に一度だけ返す。以後取得不可
/// - 保存するのはSHA-256ハッシュのみ。平文はログ出力禁止
/// - 各コードは使い捨て。消費は `TwoFactorCredential::redeem_backup_code` が行う
#[derive(Clone)]
pub struct BackupCodeService;

impl BackupCodeService {
    /// バックアップコードを生成
    ///
    /// 各コードは独立した4バイトのCSPRNG出力を大文字hex 8文字にし、
    /// `XXXX-XXXX` 形式（例: `A1B2-C3D4`）に整形する
    pub fn generate_codes() -> Vec<String> {
        (0..BACKUP_CODE_COUNT)
            .map(|_| {
                let mut bytes = [0u8; BACKUP_CODE_BYTES];
                rand::thread_rng().fill_bytes(&mut bytes);
                let hex = HEXUPPER.encode(&bytes);
                format!("{}-{}", &hex[..4], &hex[4..])
            })
            .collect()
    }

    /// コードをSHA-256でハッシュ化
    ///
    /// ハイフン・空白を除去してからハッシュするため、
    /// `A1B2-C3D4` と `A1B2C3D4` は同じダイジェストになる（決定的）
    pub fn hash_code(code: &str) -> String {
        let normalized = normalize_code(code);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 生成済みコード一覧を保存用ハッシュ集合に変換
    pub fn hash_codes(codes: &[String]) -> HashSet<String> {
        codes.iter().map(|code| Self::hash_code(code)).collect()
    }

    /// 提示されたコードを保存済みハッシュと照合
    pub fn verify(presented_code: &str, stored_hash: &str) -> bool {
        Self::hash_code(presented_code) == stored_hash
    }

    /// ダウンロード用プレーンテキストを構築（生成日時つき）
    ///
    /// UIはこれをそのままテキストファイルとしてユーザーに提供する
    pub fn render_codes_file(codes: &[String]) -> String {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::new());

        let mut body = format!("バックアップコード（生成日時: {}）\n\n", generated_at);
        for code in codes {
            body.push_str(code);
            body.push('\n');
        }
        body.push_str("\n各コードは一度しか使用できません。安全な場所に保管してください。\n");
        body
    }
}

/// ハイフン・空白を除去して比較可能な形に正規化
fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}
