//! Dual `log`/`defmt` logging macros, the same shape `embassy-time`'s own
//! sibling crates use: each macro forwards to whichever backend feature is
//! enabled, and is a silent no-op with neither. Kept separate from
//! `btmesh-common`'s `defmt::Format` derives, which only cover `Debug`-style
//! formatting of values, not call-site logging.

#![allow(unused_macros)]

macro_rules! trace {
    ($($x:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($($x)*);
            #[cfg(feature = "defmt")]
            ::defmt::trace!($($x)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($x)*,);
        }
    };
}

macro_rules! debug {
    ($($x:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::debug!($($x)*);
            #[cfg(feature = "defmt")]
            ::defmt::debug!($($x)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($x)*,);
        }
    };
}

macro_rules! warn {
    ($($x:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($($x)*);
            #[cfg(feature = "defmt")]
            ::defmt::warn!($($x)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($($x)*,);
        }
    };
}

pub(crate) use debug;
pub(crate) use trace;
pub(crate) use warn;
