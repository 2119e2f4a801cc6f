use crate::backup::result_error::error::Error;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use itertools::Itertools;

pub type Result<T> = std::result::Result<T, Error>;

impl<R, S: Into<String>> AddFunctionName<S> for Result<R> {
    fn add_fn_name(self, fn_name: S) -> Self {
        self.map_err(|e| e.add_fn_name(fn_name))
    }
}

impl<R, S: Into<String>> AddMsg<S> for Result<R> {
    fn add_msg(self, msg: S) -> Self {
        self.map_err(|e| e.add_msg(msg))
    }
}

pub fn convert_error_vec(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::lots_of_error(
            errors.into_iter().flat_map(Error::into_iter).collect_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_empty_error_vec() {
        assert!(convert_error_vec(vec![]).is_ok());
    }

    #[test]
    fn test_convert_error_vec_flattens() {
        let nested = Error::lots_of_error(vec![
            Error::invalid_endpoint("a"),
            Error::invalid_endpoint("b"),
        ]);
        let res = convert_error_vec(vec![nested, Error::invalid_endpoint("c")]);
        match res {
            Err(Error::LotsOfError(v)) => assert_eq!(v.len(), 3),
            other => panic!("Expected LotsOfError, got {other:?}"),
        }
    }

    #[test]
    fn test_result_add_msg_only_touches_err() {
        let ok: Result<u8> = Ok(1);
        assert_eq!(ok.add_msg("unused").unwrap(), 1);

        let err: Result<u8> = Err(Error::invalid_endpoint("x"));
        match err.add_msg("context") {
            Err(Error::WithMsg { msg, .. }) => assert_eq!(msg, "context"),
            other => panic!("Expected WithMsg, got {other:?}"),
        }
    }
}
