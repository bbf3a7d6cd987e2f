use crate::services::session::SessionKind;

/// セッショントークンを配送するクッキー名
pub const SESSION_COOKIE_NAME: &str = "auth-token";

/// セッションクッキーの `Set-Cookie` 値を構築
///
/// `HttpOnly; SameSite=Lax; Path=/`、`Max-Age` はセッション有効期間。
/// 再発行時も必ず同じ属性で上書きする。
/// `secure` はHTTPS配信（本番環境）でのみ true にする
pub fn build_session_cookie(token: &str, kind: SessionKind, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE_NAME,
        token,
        kind.duration_secs(),
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// ログアウト用のクッキー削除値を構築（Max-Age=0）
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE_NAME,
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
