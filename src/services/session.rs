use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

/// セッション種別ごとの有効期間ポリシー
///
/// クッキー裏付けの長期セッションと短期APIトークンは独立したポリシーで、
/// 呼び出し側が用途に応じて選択する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// クッキー配送の長期セッション（7日）
    Cookie,
    /// 短期APIトークン（24時間）
    Api,
}

impl SessionKind {
    /// セッション有効期間（秒）
    pub fn duration_secs(self) -> i64 {
        match self {
            SessionKind::Cookie => 7 * 24 * 60 * 60,
            SessionKind::Api => 24 * 60 * 60,
        }
    }

    /// スライディング更新の閾値（秒）
    ///
    /// 残り有効期間がこれを下回ったら再発行する
    pub fn refresh_threshold_secs(self) -> i64 {
        match self {
            SessionKind::Cookie => 24 * 60 * 60,
            SessionKind::Api => 60 * 60,
        }
    }
}

/// セッショントークンのクレーム
///
/// 下流の認可レイヤーが依存してよいのはこのフィールドのみ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// ユーザーID
    pub uid: String,
    pub email: String,
    pub role: String,
    /// 有効期限（Unix秒）。必ず設定され、検証のたびにチェックされる
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// セッショントークンサービス（HMAC-SHA256署名）
///
/// 検証・更新はトークン自身のバイト列と現在時刻だけで完結する純粋計算。
/// 共有可変状態を持たないためロック不要で、並行リクエストでも安全。
///
/// # Security
/// - トークン本体はログに出力しない
/// - 検証失敗は原因（署名不正・形式不正・期限切れ）を区別せず一律 None
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionService {
    /// 新しい SessionService を作成
    ///
    /// # Arguments
    /// * `jwt_secret` - HMAC-SHA256署名用の共有シークレット
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    /// セッショントークンを発行
    ///
    /// `exp` は 現在時刻 + 種別ごとの有効期間
    pub fn create(
        &self,
        uid: &str,
        email: &str,
        role: &str,
        name: Option<&str>,
        kind: SessionKind,
    ) -> Result<String, AppError> {
        self.create_at(uid, email, role, name, kind, now_unix())
    }

    /// セッショントークンを検証してクレームを返す
    ///
    /// 署名不一致・形式不正・期限切れはすべて None（「有効なセッションなし」）。
    /// どの失敗モードかを呼び出し側に漏らさない
    pub fn verify(&self, token: &str) -> Option<Claims> {
        self.verify_at(token, now_unix())
    }

    /// 残り有効期間が閾値を下回っていれば同一クレームで再発行
    ///
    /// スライディング更新: アクティブなユーザーのセッションは切れず、
    /// 放置されたセッションは予定どおり失効する。
    /// 無効・期限切れトークンは更新対象外（再認証でのみ復活）
    pub fn refresh_if_needed(
        &self,
        token: &str,
        kind: SessionKind,
    ) -> Result<Option<String>, AppError> {
        self.refresh_if_needed_at(token, kind, now_unix())
    }

    /// 指定時刻でトークンを発行（テストで期限を決定的に扱うため分離）
    fn create_at(
        &self,
        uid: &str,
        email: &str,
        role: &str,
        name: Option<&str>,
        kind: SessionKind,
        now: i64,
    ) -> Result<String, AppError> {
        let claims = Claims {
            uid: uid.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: now + kind.duration_secs(),
            name: name.map(str::to_string),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = ?e, "セッショントークンの署名エラー");
            AppError::Internal(anyhow::anyhow!("token signing error"))
        })
    }

    /// 指定時刻でトークンを検証
    ///
    /// 期限はライブラリ任せにせず `exp > now` を明示的にチェックする
    /// （leeway 0、テストが境界を決定的に扱えるように）
    fn verify_at(&self, token: &str, now: i64) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            // 失敗理由は区別しない（オラクル防止）。トークンはログ出力禁止
            Err(_) => return None,
        };

        if claims.exp > now { Some(claims) } else { None }
    }

    /// 指定時刻でスライディング更新を判定
    fn refresh_if_needed_at(
        &self,
        token: &str,
        kind: SessionKind,
        now: i64,
    ) -> Result<Option<String>, AppError> {
        let claims = match self.verify_at(token, now) {
            Some(claims) => claims,
            None => return Ok(None),
        };

        let remaining = claims.exp - now;
        if remaining >= kind.refresh_threshold_secs() {
            return Ok(None);
        }

        let reissued = self.create_at(
            &claims.uid,
            &claims.email,
            &claims.role,
            claims.name.as_deref(),
            kind,
            now,
        )?;

        tracing::debug!(uid = %claims.uid, "セッショントークンを再発行");

        Ok(Some(reissued))
    }
}

/// 現在のUnix時刻（秒）
fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn create_test_service() -> SessionService {
        SessionService::new("test-signing-secret")
    }

    fn create_test_token(service: &SessionService, kind: SessionKind, now: i64) -> String {
        service
            .create_at(
                "user-1",
                "user@example.com",
                "member",
                Some("Alice"),
                kind,
                now,
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_verify_roundtrip() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        let claims = service.verify_at(&token, NOW).expect("token should verify");
        assert_eq!(claims.uid, "user-1");
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.role, "member");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(claims.exp, NOW + SessionKind::Cookie.duration_secs());
    }

    #[test]
    fn test_create_without_name() {
        let service = create_test_service();
        let token = service
            .create_at("user-1", "user@example.com", "member", None, SessionKind::Api, NOW)
            .unwrap();

        let claims = service.verify_at(&token, NOW).expect("token should verify");
        assert_eq!(claims.name, None);
        assert_eq!(claims.exp, NOW + SessionKind::Api.duration_secs());
    }

    #[test]
    fn test_claims_serialization_omits_missing_name() {
        let claims = Claims {
            uid: "user-1".to_string(),
            email: "user@example.com".to_string(),
            role: "member".to_string(),
            exp: NOW,
            name: None,
        };

        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("name").is_none());
        assert_eq!(value["uid"], "user-1");
        assert_eq!(value["exp"], NOW);
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        let expiry = NOW + SessionKind::Cookie.duration_secs();
        // 期限ちょうど・期限後はNone（exp > now の厳密チェック）
        assert!(service.verify_at(&token, expiry).is_none());
        assert!(service.verify_at(&token, expiry + 1).is_none());
        // 期限1秒前はOK
        assert!(service.verify_at(&token, expiry - 1).is_some());
    }

    #[test]
    fn test_verify_rejects_tampered_token() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        // ペイロード部分を破壊
        let mut tampered = token.clone();
        let middle = tampered.len() / 2;
        let replacement = if &tampered[middle..middle + 1] == "x" { "y" } else { "x" };
        tampered.replace_range(middle..middle + 1, replacement);

        assert!(service.verify_at(&tampered, NOW).is_none());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        let other = SessionService::new("another-signing-secret");
        assert!(other.verify_at(&token, NOW).is_none());
    }

    #[test]
    fn test_verify_rejects_malformed_token() {
        let service = create_test_service();
        assert!(service.verify_at("", NOW).is_none());
        assert!(service.verify_at("not.a.jwt", NOW).is_none());
        assert!(service.verify_at("garbage", NOW).is_none());
    }

    #[test]
    fn test_refresh_not_needed_for_fresh_token() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        // 発行直後は残り7日 > 閾値1日 → 更新なし
        let refreshed = service
            .refresh_if_needed_at(&token, SessionKind::Cookie, NOW)
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[test]
    fn test_refresh_reissues_below_threshold() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        // 残り有効期間が閾値（1日）を下回る時刻まで進める
        let later = NOW + SessionKind::Cookie.duration_secs()
            - SessionKind::Cookie.refresh_threshold_secs()
            + 1;

        let reissued = service
            .refresh_if_needed_at(&token, SessionKind::Cookie, later)
            .unwrap()
            .expect("token should be reissued");

        // 新トークンは同一クレーム・より先の期限を持つ
        let old_claims = service.verify_at(&token, later).unwrap();
        let new_claims = service.verify_at(&reissued, later).unwrap();
        assert_eq!(new_claims.uid, old_claims.uid);
        assert_eq!(new_claims.email, old_claims.email);
        assert_eq!(new_claims.role, old_claims.role);
        assert_eq!(new_claims.name, old_claims.name);
        assert!(new_claims.exp > old_claims.exp);
        assert_eq!(new_claims.exp, later + SessionKind::Cookie.duration_secs());
    }

    #[test]
    fn test_refresh_at_threshold_boundary() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        // 残りがちょうど閾値のときは更新しない
        let at_threshold = NOW + SessionKind::Cookie.duration_secs()
            - SessionKind::Cookie.refresh_threshold_secs();
        let refreshed = service
            .refresh_if_needed_at(&token, SessionKind::Cookie, at_threshold)
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[test]
    fn test_refresh_rejects_expired_token() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Cookie, NOW);

        // 期限切れトークンは更新不可（再認証が必要）
        let after_expiry = NOW + SessionKind::Cookie.duration_secs() + 1;
        let refreshed = service
            .refresh_if_needed_at(&token, SessionKind::Cookie, after_expiry)
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[test]
    fn test_refresh_rejects_invalid_token() {
        let service = create_test_service();
        let refreshed = service
            .refresh_if_needed_at("garbage", SessionKind::Cookie, NOW)
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[test]
    fn test_api_token_uses_short_duration() {
        let service = create_test_service();
        let token = create_test_token(&service, SessionKind::Api, NOW);

        let claims = service.verify_at(&token, NOW).unwrap();
        assert_eq!(claims.exp, NOW + 24 * 60 * 60);

        // 24時間後には失効
        assert!(service.verify_at(&token, NOW + 24 * 60 * 60).is_none());
    }
}
