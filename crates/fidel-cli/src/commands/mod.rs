/// Unwrap `$result` or print the error to stderr and exit with status 1.
macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod compile_ops;
pub mod config_ops;
pub mod decode_ops;
pub mod explain_ops;
pub mod models;
