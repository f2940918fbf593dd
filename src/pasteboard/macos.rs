//! `NSPasteboard` backend.

use super::{formats, Pasteboard, PasteboardError};
use cocoa::base::{id, nil, BOOL, NO};
use cocoa::foundation::{NSAutoreleasePool, NSInteger, NSString, NSUInteger};
use objc::{class, msg_send, sel, sel_impl};
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::path::PathBuf;
use tracing::{trace, warn};

/// The general system pasteboard
pub struct MacPasteboard {
    inner: id,
}

impl MacPasteboard {
    pub fn general() -> Self {
        let inner: id = unsafe { msg_send![class!(NSPasteboard), generalPasteboard] };
        Self { inner }
    }
}

/// Drains an autorelease pool on drop
struct Pool(id);

impl Pool {
    fn new() -> Self {
        Pool(unsafe { NSAutoreleasePool::new(nil) })
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        unsafe {
            let _: () = msg_send![self.0, drain];
        }
    }
}

/// Autoreleased NSString (must be called inside a [`Pool`])
unsafe fn ns_string(value: &str) -> id {
    let string = NSString::alloc(nil).init_str(value);
    msg_send![string, autorelease]
}

unsafe fn rust_string(string: id) -> Option<String> {
    if string == nil {
        return None;
    }
    let ptr: *const c_char = msg_send![string, UTF8String];
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

unsafe fn data_bytes(data: id) -> Option<Vec<u8>> {
    if data == nil {
        return None;
    }
    let length: NSUInteger = msg_send![data, length];
    let bytes: *const u8 = msg_send![data, bytes];
    if length == 0 || bytes.is_null() {
        return Some(Vec::new());
    }
    Some(std::slice::from_raw_parts(bytes, length as usize).to_vec())
}

impl Pasteboard for MacPasteboard {
    fn change_count(&self) -> i64 {
        let count: NSInteger = unsafe { msg_send![self.inner, changeCount] };
        count as i64
    }

    fn types(&self) -> Vec<String> {
        let _pool = Pool::new();
        unsafe {
            let types: id = msg_send![self.inner, types];
            if types == nil {
                return vec![];
            }
            let count: NSUInteger = msg_send![types, count];
            (0..count)
                .filter_map(|i| {
                    let ty: id = msg_send![types, objectAtIndex: i];
                    rust_string(ty)
                })
                .collect()
        }
    }

    fn read(&self, format: &str) -> Option<Vec<u8>> {
        let _pool = Pool::new();
        unsafe {
            let data: id = msg_send![self.inner, dataForType: ns_string(format)];
            data_bytes(data)
        }
    }

    fn read_image_object(&self) -> Option<Vec<u8>> {
        let _pool = Pool::new();
        unsafe {
            let can_init: BOOL = msg_send![class!(NSImage), canInitWithPasteboard: self.inner];
            if can_init == NO {
                return None;
            }
            let image: id = msg_send![class!(NSImage), alloc];
            let image: id = msg_send![image, initWithPasteboard: self.inner];
            if image == nil {
                return None;
            }
            let tiff: id = msg_send![image, TIFFRepresentation];
            let bytes = data_bytes(tiff);
            let _: () = msg_send![image, release];
            bytes
        }
    }

    fn read_file_references(&self) -> Vec<PathBuf> {
        let _pool = Pool::new();
        let mut paths = Vec::new();
        unsafe {
            let items: id = msg_send![self.inner, pasteboardItems];
            if items == nil {
                return paths;
            }
            let count: NSUInteger = msg_send![items, count];
            for i in 0..count {
                let item: id = msg_send![items, objectAtIndex: i];
                let value: id = msg_send![item, stringForType: ns_string(formats::FILE_URL)];
                let Some(raw) = rust_string(value) else { continue };
                match url::Url::parse(&raw).map(|url| url.to_file_path()) {
                    Ok(Ok(path)) => paths.push(path),
                    _ => trace!("Ignoring non-file URL on pasteboard: {}", raw),
                }
            }
        }
        paths
    }

    fn write(&mut self, format: &str, bytes: &[u8]) -> Result<(), PasteboardError> {
        let _pool = Pool::new();
        let accepted = unsafe {
            let data: id = msg_send![class!(NSData),
                dataWithBytes: bytes.as_ptr() as *const c_void
                length: bytes.len() as NSUInteger];
            let ok: BOOL = msg_send![self.inner, setData: data forType: ns_string(format)];
            ok != NO
        };

        if accepted {
            Ok(())
        } else {
            warn!("NSPasteboard rejected {} bytes for {}", bytes.len(), format);
            Err(PasteboardError::WriteRejected(format.to_string()))
        }
    }

    fn clear(&mut self) {
        unsafe {
            let _: NSInteger = msg_send![self.inner, clearContents];
        }
    }
}
