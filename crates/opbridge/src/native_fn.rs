//! Function-pointer types a symbol can be bound as.

use std::ffi::c_void;
use std::ptr::NonNull;

/// A C-ABI function pointer type.
///
/// Implemented for `extern "C" fn` and `unsafe extern "C" fn` pointers of up
/// to eight arguments. `ARITY` lets the bridge compare a host's declared
/// argument count with the type it asks for; nothing else about the
/// signature can be checked.
///
/// # Safety
///
/// Implementors must be pointer-sized function pointers for which any
/// non-null code address is a valid bit pattern.
pub unsafe trait NativeFn: Copy + Send + Sync + 'static {
    /// Number of arguments.
    const ARITY: usize;

    /// Reinterpret a resolved symbol address as `Self`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the address of a function whose real signature and
    /// calling convention match `Self`.
    unsafe fn from_ptr(ptr: NonNull<c_void>) -> Self;
}

macro_rules! impl_native_fn {
    ($arity:expr; $($arg:ident),*) => {
        unsafe impl<R: 'static, $($arg: 'static),*> NativeFn for unsafe extern "C" fn($($arg),*) -> R {
            const ARITY: usize = $arity;

            unsafe fn from_ptr(ptr: NonNull<c_void>) -> Self {
                // SAFETY: function pointers are pointer-sized; the caller
                // vouches for the signature.
                unsafe { std::mem::transmute_copy::<*mut c_void, Self>(&ptr.as_ptr()) }
            }
        }

        unsafe impl<R: 'static, $($arg: 'static),*> NativeFn for extern "C" fn($($arg),*) -> R {
            const ARITY: usize = $arity;

            unsafe fn from_ptr(ptr: NonNull<c_void>) -> Self {
                // SAFETY: as above.
                unsafe { std::mem::transmute_copy::<*mut c_void, Self>(&ptr.as_ptr()) }
            }
        }
    };
}

impl_native_fn!(0;);
impl_native_fn!(1; A1);
impl_native_fn!(2; A1, A2);
impl_native_fn!(3; A1, A2, A3);
impl_native_fn!(4; A1, A2, A3, A4);
impl_native_fn!(5; A1, A2, A3, A4, A5);
impl_native_fn!(6; A1, A2, A3, A4, A5, A6);
impl_native_fn!(7; A1, A2, A3, A4, A5, A6, A7);
impl_native_fn!(8; A1, A2, A3, A4, A5, A6, A7, A8);
