//! Fatal diagnostics.
//!
//! A corrupted heap cannot be scavenged safely: following a bogus field would
//! corrupt it further. Every such condition ends up in [`fatal`], which logs
//! the diagnostic and panics. Runtimes embedding the scavenger build with
//! `panic = "abort"` so the panic terminates the process.

use std::fmt;

/// Report heap corruption and abort scavenging.
#[cold]
#[track_caller]
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    #[cfg(feature = "tracing")]
    super::tracing::log_fatal(&args);
    panic!("nonmoving scavenge: {args}");
}

/// Report heap corruption with a formatted message.
macro_rules! barf {
    ($($arg:tt)*) => {
        $crate::gc::fatal::fatal(format_args!($($arg)*))
    };
}

pub(crate) use barf;

#[cfg(test)]
mod tests {
    #[test]
    #[should_panic(expected = "nonmoving scavenge: strange closure type 99 @ 0x10")]
    fn test_barf_message() {
        barf!("strange closure type {} @ {:#x}", 99, 0x10);
    }
}
