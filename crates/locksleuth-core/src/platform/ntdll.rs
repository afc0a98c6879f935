/// `ntdll` entry points the `windows` crate does not project.
use crate::nt::NtStatus;
use std::ffi::c_void;
use windows::Win32::Foundation::HANDLE;

pub const SYSTEM_EXTENDED_HANDLE_INFORMATION: u32 = 64;
pub const OBJECT_NAME_INFORMATION: u32 = 1;
pub const OBJECT_TYPES_INFORMATION: u32 = 3;

pub const THREAD_ALL_ACCESS: u32 = 0x001F_FFFF;
/// No `DLL_THREAD_ATTACH`/`DETACH` callouts run on the new thread.
pub const THREAD_CREATE_FLAGS_SKIP_THREAD_ATTACH: u32 = 0x0000_0002;

#[link(name = "ntdll")]
extern "system" {
    pub fn NtQuerySystemInformation(
        system_information_class: u32,
        system_information: *mut c_void,
        system_information_length: u32,
        return_length: *mut u32,
    ) -> NtStatus;

    pub fn NtQueryObject(
        handle: HANDLE,
        object_information_class: u32,
        object_information: *mut c_void,
        object_information_length: u32,
        return_length: *mut u32,
    ) -> NtStatus;

    pub fn NtCreateThreadEx(
        thread_handle: *mut HANDLE,
        desired_access: u32,
        object_attributes: *const c_void,
        process_handle: HANDLE,
        start_routine: *mut c_void,
        argument: *mut c_void,
        create_flags: u32,
        zero_bits: usize,
        stack_size: usize,
        maximum_stack_size: usize,
        attribute_list: *mut c_void,
    ) -> NtStatus;
}
