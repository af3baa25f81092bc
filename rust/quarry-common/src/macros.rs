/// Macro for handling `Result<T, E>` in functions that return `Option<Result<T, E>>`.
///
/// - If `expr` evaluates to `Ok(t)`, the macro yields `t`.
/// - If `expr` evaluates to `Err(e)`, the macro causes the enclosing function to
///   return `Some(Err(e))`.
///
/// Used by the `Iterator` adapters over term and postings cursors, whose `next()`
/// yields `Option<Result<..>>` while the cursor methods return `Result<..>`.
#[macro_export]
macro_rules! try_or_ret_some_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Some(Err(err));
            }
        }
    };
}

/// Returns early with a corruption error for the given resource, formatting the
/// message like `format!`.
#[macro_export]
macro_rules! bail_corrupt {
    ($resource:expr, $($arg:tt)+) => {
        return Err($crate::error::Error::corrupt_index($resource, format!($($arg)+)))
    };
}
