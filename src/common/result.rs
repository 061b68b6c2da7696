use crate::common::error::WsyncError;

/// wsync全体で使用するResult型のエイリアス
///
/// # Examples
///
/// ```
/// use wsync::common::result::WsyncResult;
///
/// fn example_function() -> WsyncResult<String> {
///     Ok("success".to_string())
/// }
/// ```
pub type WsyncResult<T> = Result<T, WsyncError>;
