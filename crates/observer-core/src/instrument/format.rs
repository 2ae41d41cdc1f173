//! Typed value rendering for log records, and the baton extraction that
//! underpins correlation.
//!
//! The baton is the data pointer inside a reflection value header. The
//! layout assumption lives in exactly one place ([`extract_value_ptr`]) and
//! is guarded by a round-trip test; any change to the header shape must go
//! through both.

use std::any::Any;

/// In-memory layout of a reflection value header: a type pointer followed
/// by a data pointer. Values handed to [`extract_value_ptr`] and
/// [`format_value`] must begin with this layout; anything else yields a
/// zero baton.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ValueHeader {
    pub typ: *const u8,
    pub ptr: *const u8,
}

/// Read the baton out of a reflection value.
///
/// An `&dyn Any` is a (data, vtable) pair whose data half points at the
/// concrete value, which plays the role of the interface header's data
/// pointer. The concrete value is expected to start with a
/// [`ValueHeader`]; the baton is its inner data pointer. This is the one
/// layout-sensitive read in the system. It is inherently fragile against
/// changes to the header shape, which is why the shape is pinned here and
/// nowhere else.
pub fn extract_value_ptr(value: &dyn Any) -> u64 {
    if std::mem::size_of_val(value) < std::mem::size_of::<ValueHeader>() {
        return 0;
    }

    let data = value as *const dyn Any as *const ValueHeader;
    // SAFETY: `data` points at a live value at least as large as
    // `ValueHeader` (checked above), and `ValueHeader` consists of plain
    // pointers, so any bit pattern is a valid read.
    let header = unsafe { data.read_unaligned() };

    if header.ptr.is_null() {
        return 0;
    }
    header.ptr as u64
}

pub fn format_int(value: i64) -> String {
    value.to_string()
}

pub fn format_uint(value: u64) -> String {
    value.to_string()
}

pub fn format_float(value: f64) -> String {
    value.to_string()
}

pub fn format_bool(value: bool) -> String {
    if value {
        "true".to_string()
    } else {
        "false".to_string()
    }
}

pub fn format_string(value: &str) -> String {
    value.to_string()
}

/// `len:N,hex:<first-8-bytes>..`: a length plus a short hex preview, with
/// a `..` suffix when truncated.
pub fn format_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "len:0".to_string();
    }

    let preview_len = bytes.len().min(8);
    let mut out = format!("len:{},hex:", bytes.len());
    for byte in &bytes[..preview_len] {
        out.push_str(&format!("{byte:02x}"));
    }
    if bytes.len() > preview_len {
        out.push_str("..");
    }
    out
}

/// Render the baton of a reflection value, or `nil` when extraction fails.
pub fn format_value(value: &dyn Any) -> String {
    let ptr = extract_value_ptr(value);
    if ptr == 0 {
        "nil".to_string()
    } else {
        format_uint(ptr)
    }
}

/// Address fallback for composite values with no better rendering: the
/// value's own address, which is at least unique per live instance.
pub fn format_pointer(value: &dyn Any) -> String {
    let addr = value as *const dyn Any as *const u8 as usize;
    format_uint(addr as u64)
}

/// Dispatch on the runtime type, mirroring the prolog's static table for
/// the types that reach it as `any`.
pub fn format_any(value: &dyn Any) -> String {
    if let Some(v) = value.downcast_ref::<String>() {
        return format_string(v);
    }
    if let Some(v) = value.downcast_ref::<&str>() {
        return format_string(v);
    }
    if let Some(v) = value.downcast_ref::<i8>() {
        return format_int(*v as i64);
    }
    if let Some(v) = value.downcast_ref::<i16>() {
        return format_int(*v as i64);
    }
    if let Some(v) = value.downcast_ref::<i32>() {
        return format_int(*v as i64);
    }
    if let Some(v) = value.downcast_ref::<i64>() {
        return format_int(*v);
    }
    if let Some(v) = value.downcast_ref::<isize>() {
        return format_int(*v as i64);
    }
    if let Some(v) = value.downcast_ref::<u8>() {
        return format_uint(*v as u64);
    }
    if let Some(v) = value.downcast_ref::<u16>() {
        return format_uint(*v as u64);
    }
    if let Some(v) = value.downcast_ref::<u32>() {
        return format_uint(*v as u64);
    }
    if let Some(v) = value.downcast_ref::<u64>() {
        return format_uint(*v);
    }
    if let Some(v) = value.downcast_ref::<usize>() {
        return format_uint(*v as u64);
    }
    if let Some(v) = value.downcast_ref::<f32>() {
        return format_float(*v as f64);
    }
    if let Some(v) = value.downcast_ref::<f64>() {
        return format_float(*v);
    }
    if let Some(v) = value.downcast_ref::<bool>() {
        return format_bool(*v);
    }
    if let Some(v) = value.downcast_ref::<Vec<u8>>() {
        return format_bytes(v);
    }
    if let Some(v) = value.downcast_ref::<Vec<String>>() {
        return format!("slice:string,len:{}", v.len());
    }
    if let Some(v) = value.downcast_ref::<Vec<i64>>() {
        return format!("slice:int64,len:{}", v.len());
    }
    if let Some(v) = value.downcast_ref::<Vec<u64>>() {
        return format!("slice:uint64,len:{}", v.len());
    }
    if let Some(v) = value.downcast_ref::<Vec<f64>>() {
        return format!("slice:float64,len:{}", v.len());
    }

    format_pointer(value)
}
