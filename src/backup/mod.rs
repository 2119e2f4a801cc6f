pub mod backup_config;
pub mod compress;
pub mod device;
pub mod finish;
pub mod pipeline;
pub mod publish;
pub mod redacted;
pub mod result_error;
pub mod tar;
pub mod trim;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
