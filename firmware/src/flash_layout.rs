use core::ops::Range;

unsafe extern "C" {
    static __config_start: u32;
    static __config_end: u32;
}

/// Flash range holding the persistent configuration map, as offsets from
/// the start of flash.
pub fn get_config_range() -> Range<u32> {
    unsafe {
        let start = &__config_start as *const u32 as u32;
        let end = &__config_end as *const u32 as u32;
        start..end
    }
}
