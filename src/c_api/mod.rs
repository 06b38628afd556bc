//! C API for prefixdb
//!
//! Stable C ABI with the classic `prefixdb_*` names, status codes and flags,
//! so existing C callers link against this library unchanged. See
//! `include/prefixdb.h` for the matching declarations.
//!
//! Functions return [`PREFIXDB_ERROR_OK`] or one of the error codes. A
//! search that finds no covering prefix returns [`PREFIXDB_ERROR_NOTFOUND`],
//! which is a normal outcome rather than a failure. The `info` pointers are
//! reserved and ignored.

use crate::database::Database;
use crate::error::{self, PrefixDbError};
use crate::loader::{BufferMode, LoadMode};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::slice;

// ============================================================================
// STATUS CODES AND FLAGS
// ============================================================================

/// Success
pub const PREFIXDB_ERROR_OK: c_int = error::ERROR_OK;
/// Invalid parameter, malformed prefix or rejected database
pub const PREFIXDB_ERROR_PARAM: c_int = error::ERROR_PARAM;
/// Allocation failure
pub const PREFIXDB_ERROR_MEMORY: c_int = error::ERROR_MEMORY;
/// File access failure
pub const PREFIXDB_ERROR_ACCESS: c_int = error::ERROR_ACCESS;
/// No stored prefix covers the address
pub const PREFIXDB_ERROR_NOTFOUND: c_int = error::ERROR_NOTFOUND;

/// Copy the input buffer on load, or hand out a malloc'd copy on save
pub const PREFIXDB_FLAGS_COPY: u8 = 0x01;
/// Map the file instead of reading it
pub const PREFIXDB_FLAGS_MMAP: u8 = 0x02;

// ============================================================================
// OPAQUE HANDLE
// ============================================================================

/// Opaque database handle
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct prefixdb_t {
    _private: [u8; 0],
}

struct PrefixDbInternal {
    database: Database<'static>,
}

impl prefixdb_t {
    fn from_internal(internal: Box<PrefixDbInternal>) -> *mut Self {
        Box::into_raw(internal) as *mut Self
    }

    /// # Safety
    /// Pointer must have come from from_internal
    unsafe fn into_internal(ptr: *mut Self) -> Box<PrefixDbInternal> {
        Box::from_raw(ptr as *mut PrefixDbInternal)
    }

    /// # Safety
    /// Pointer must be valid and from from_internal
    unsafe fn as_internal_mut<'a>(ptr: *mut Self) -> &'a mut PrefixDbInternal {
        &mut *(ptr as *mut PrefixDbInternal)
    }

    fn wrap(database: Database<'static>) -> *mut Self {
        Self::from_internal(Box::new(PrefixDbInternal { database }))
    }
}

fn status(result: Result<(), PrefixDbError>) -> c_int {
    match result {
        Ok(()) => PREFIXDB_ERROR_OK,
        Err(err) => err.code(),
    }
}

/// # Safety
/// `text` must be NULL or a valid null-terminated C string
unsafe fn c_str<'a>(text: *const c_char) -> Option<&'a str> {
    if text.is_null() {
        return None;
    }
    CStr::from_ptr(text).to_str().ok()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Allocate an empty database
///
/// # Returns
/// * Non-null handle, to be released with `prefixdb_free()`
#[no_mangle]
pub extern "C" fn prefixdb_allocate() -> *mut prefixdb_t {
    prefixdb_t::wrap(Database::new())
}

/// Open a serialized database held in memory
///
/// Without [`PREFIXDB_FLAGS_COPY`] the handle reads `data` in place.
///
/// # Returns
/// * Non-null handle on success
/// * NULL if `data` is NULL or the footer is rejected
///
/// # Safety
/// * `data` must point to `size` readable bytes
/// * Without the COPY flag, `data` must stay valid and unmodified until the
///   handle is freed
///
/// # Example
/// ```c
/// PREFIXDB *db = prefixdb_load_binary(blob, blob_size, PREFIXDB_FLAGS_COPY);
/// if (db == NULL) {
///     fprintf(stderr, "invalid database\n");
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn prefixdb_load_binary(
    data: *const u8,
    size: u32,
    flags: u8,
) -> *mut prefixdb_t {
    if data.is_null() {
        return ptr::null_mut();
    }
    let bytes: &'static [u8] = slice::from_raw_parts(data, size as usize);
    let loaded = if flags & PREFIXDB_FLAGS_COPY != 0 {
        Database::copy_bytes(bytes)
    } else {
        Database::load_bytes(bytes, BufferMode::Borrow)
    };
    match loaded {
        Ok(database) => prefixdb_t::wrap(database),
        Err(_) => ptr::null_mut(),
    }
}

/// Open a database file, mapped with [`PREFIXDB_FLAGS_MMAP`] and copied
/// otherwise
///
/// # Returns
/// * Non-null handle on success
/// * NULL if the file cannot be read or its footer is rejected
///
/// # Safety
/// * `path` must be NULL or a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn prefixdb_load_file(path: *const c_char, flags: u8) -> *mut prefixdb_t {
    let Some(path) = c_str(path) else {
        return ptr::null_mut();
    };
    let mode = if flags & PREFIXDB_FLAGS_MMAP != 0 {
        LoadMode::Mmap
    } else {
        LoadMode::Copy
    };
    match Database::load_file(path, mode) {
        Ok(database) => prefixdb_t::wrap(database),
        Err(_) => ptr::null_mut(),
    }
}

/// Release a handle and set it to NULL
///
/// # Returns
/// * `PREFIXDB_ERROR_OK` on success
/// * `PREFIXDB_ERROR_PARAM` if `db` or `*db` is NULL, so a second call on
///   the same variable fails instead of freeing twice
///
/// # Safety
/// * `db` must be NULL or point to NULL or to a handle from this library
///
/// # Example
/// ```c
/// prefixdb_free(&db);  // db is now NULL
/// ```
#[no_mangle]
pub unsafe extern "C" fn prefixdb_free(db: *mut *mut prefixdb_t) -> c_int {
    if db.is_null() || (*db).is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let mut internal = prefixdb_t::into_internal(*db);
    *db = ptr::null_mut();
    status(internal.database.release())
}

// ============================================================================
// BUILDING
// ============================================================================

/// Add the prefix `address/length`; `address` is in host byte order
///
/// # Safety
/// * `db` must be NULL or a valid handle
#[no_mangle]
pub unsafe extern "C" fn prefixdb_add_binary(
    db: *mut prefixdb_t,
    address: u32,
    length: u8,
    _info: *const c_void,
) -> c_int {
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    status(internal.database.insert(address, length))
}

/// Add a prefix written as `a.b.c.d` or `a.b.c.d/len`
///
/// # Safety
/// * `db` must be NULL or a valid handle
/// * `prefix` must be NULL or a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn prefixdb_add_string(
    db: *mut prefixdb_t,
    prefix: *const c_char,
    _info: *const c_void,
) -> c_int {
    let Some(prefix) = c_str(prefix) else {
        return PREFIXDB_ERROR_PARAM;
    };
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    status(internal.database.insert_str(prefix))
}

/// Add every prefix listed in a text file
///
/// Stops at the first line that fails and returns its status.
///
/// # Safety
/// * `db` must be NULL or a valid handle
/// * `path` must be NULL or a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn prefixdb_add_file(db: *mut prefixdb_t, path: *const c_char) -> c_int {
    let Some(path) = c_str(path) else {
        return PREFIXDB_ERROR_PARAM;
    };
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    status(internal.database.insert_file(path).map(|_| ()))
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Serialize the database
///
/// With [`PREFIXDB_FLAGS_COPY`], `*data` receives a malloc'd copy the caller
/// releases with `free()`. Otherwise it points into the handle and stays
/// valid until the next modification or `prefixdb_free()`.
///
/// # Safety
/// * `db` must be NULL or a valid handle
/// * `data` and `size` must each be NULL or valid for writes
///
/// # Example
/// ```c
/// uint8_t *blob;
/// uint32_t size;
/// if (prefixdb_save_binary(db, &blob, &size, PREFIXDB_FLAGS_COPY) == PREFIXDB_ERROR_OK) {
///     fwrite(blob, 1, size, output);
///     free(blob);
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn prefixdb_save_binary(
    db: *mut prefixdb_t,
    data: *mut *mut u8,
    size: *mut u32,
    flags: u8,
) -> c_int {
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    let bytes = match internal.database.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => return err.code(),
    };

    if !data.is_null() {
        if flags & PREFIXDB_FLAGS_COPY != 0 {
            // malloc so the caller can free() it
            let copy = libc::malloc(bytes.len()) as *mut u8;
            if copy.is_null() {
                return PREFIXDB_ERROR_MEMORY;
            }
            ptr::copy_nonoverlapping(bytes.as_ptr(), copy, bytes.len());
            *data = copy;
        } else {
            *data = bytes.as_ptr() as *mut u8;
        }
    }
    if !size.is_null() {
        *size = bytes.len() as u32;
    }
    PREFIXDB_ERROR_OK
}

/// Serialize the database into a file
///
/// # Safety
/// * `db` must be NULL or a valid handle
/// * `path` must be NULL or a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn prefixdb_save_file(db: *mut prefixdb_t, path: *const c_char) -> c_int {
    let Some(path) = c_str(path) else {
        return PREFIXDB_ERROR_PARAM;
    };
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    status(internal.database.save(path))
}

// ============================================================================
// SEARCH
// ============================================================================

/// Look up `address` (host byte order)
///
/// # Returns
/// * `PREFIXDB_ERROR_OK` when a stored prefix covers the address
/// * `PREFIXDB_ERROR_NOTFOUND` when none does
/// * `PREFIXDB_ERROR_PARAM` for a NULL handle or a corrupt database
///
/// # Safety
/// * `db` must be NULL or a valid handle
#[no_mangle]
pub unsafe extern "C" fn prefixdb_search_binary(
    db: *mut prefixdb_t,
    address: u32,
    _info: *mut *mut c_void,
) -> c_int {
    if db.is_null() {
        return PREFIXDB_ERROR_PARAM;
    }
    let internal = prefixdb_t::as_internal_mut(db);
    match internal.database.search(address) {
        Ok(found) if found.is_match() => PREFIXDB_ERROR_OK,
        Ok(_) => PREFIXDB_ERROR_NOTFOUND,
        Err(err) => err.code(),
    }
}

/// Look up a dotted-quad address
///
/// # Safety
/// * `db` must be NULL or a valid handle
/// * `address` must be NULL or a valid null-terminated C string
///
/// # Example
/// ```c
/// if (prefixdb_search_string(db, "192.168.3.4", NULL) == PREFIXDB_ERROR_OK) {
///     printf("matched\n");
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn prefixdb_search_string(
    db: *mut prefixdb_t,
    address: *const c_char,
    info: *mut *mut c_void,
) -> c_int {
    let Some(address) = c_str(address) else {
        return PREFIXDB_ERROR_PARAM;
    };
    match crate::tree_builder::parse_address(address) {
        Ok(address) => prefixdb_search_binary(db, u32::from(address), info),
        Err(err) => err.code(),
    }
}

/// Release search info. No info is ever produced; always succeeds.
///
/// # Safety
/// Accepts any pointer, including NULL
#[no_mangle]
pub unsafe extern "C" fn prefixdb_free_info(_info: *mut *mut c_void) -> c_int {
    PREFIXDB_ERROR_OK
}
