use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 署名キー・暗号化キーの欠落または不正な形式
    ///
    /// 起動時または初回使用時に検出される致命的な設定ミス。リトライ不可。
    #[error("設定エラー: {0}")]
    Config(String),

    /// AES-GCM認証タグの検証失敗（暗号文の改ざんまたはキー不一致）
    #[error("暗号データの整合性エラー")]
    Integrity,

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Config(msg) => {
                tracing::error!(reason = %msg, "設定エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Integrity => {
                // 改ざんの可能性があるため詳細はログのみに残す
                tracing::error!("暗号データの整合性エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
