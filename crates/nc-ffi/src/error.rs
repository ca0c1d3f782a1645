use std::cell::RefCell;
use std::ffi::CString;

use nc_matrix::MatrixError;

use crate::types::NCStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `nc_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` as the last error and translate it into a status code.
pub fn report(err: MatrixError) -> NCStatus {
    let status = NCStatus::from(&err);
    set_last_error(err.to_string());
    status
}
