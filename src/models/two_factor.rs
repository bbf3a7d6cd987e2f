use std::collections::HashSet;

use serde::Serialize;

use crate::services::BackupCodeService;

/// ユーザーの二要素認証クレデンシャル（永続化対象の形）
///
/// シークレットは AES-256-GCM で暗号化されて保存される。
/// 平文シークレットはログ出力禁止。
/// `backup_code_hashes` の各ハッシュは未使用コード1件に対応する。
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorCredential {
    /// SecretVault が生成した `iv:ciphertext:authTag` 形式の暗号文
    #[serde(skip)]
    pub encrypted_secret: String,
    /// 未使用バックアップコードのSHA-256ハッシュ集合
    #[serde(skip)]
    pub backup_code_hashes: HashSet<String>,
    pub enabled: bool,
}

impl TwoFactorCredential {
    /// 登録時に作成（初回コード検証が通るまで enabled=false）
    pub fn new(encrypted_secret: String, backup_code_hashes: HashSet<String>) -> Self {
        Self {
            encrypted_secret,
            backup_code_hashes,
            enabled: false,
        }
    }

    /// 初回コード検証成功後に2FAを有効化
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// バックアップコードを消費（使い捨てセマンティクス）
    ///
    /// 提示コードのハッシュが集合に存在すれば削除して true を返す。
    /// 削除済みの集合を単一の条件付き更新で永続化するのは呼び出し側の責務。
    /// 同一コードの再提示は（集合からハッシュが消えているため）必ず失敗する。
    pub fn redeem_backup_code(&mut self, presented_code: &str) -> bool {
        let hash = BackupCodeService::hash_code(presented_code);
        self.backup_code_hashes.remove(&hash)
    }

    /// バックアップコードを一括再生成（既存ハッシュは全て破棄）
    pub fn replace_backup_codes(&mut self, backup_code_hashes: HashSet<String>) {
        self.backup_code_hashes = backup_code_hashes;
    }
}
