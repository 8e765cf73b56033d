#[cfg(all(not(test), not(feature = "debug-checks")))]
pub const AD3_ASSERT_LEVEL_DEFINITION: u8 = AD3_ASSERT_SIMPLE;

#[cfg(any(test, feature = "debug-checks"))]
pub const AD3_ASSERT_LEVEL_DEFINITION: u8 = AD3_ASSERT_MODERATE;

pub const AD3_ASSERT_SIMPLE: u8 = 1;
pub const AD3_ASSERT_MODERATE: u8 = 2;
pub const AD3_ASSERT_ADVANCED: u8 = 3;

#[macro_export]
#[doc(hidden)]
macro_rules! ad3_assert_simple {
    ($($arg:tt)*) => {
        if $crate::asserts::AD3_ASSERT_LEVEL_DEFINITION >= $crate::asserts::AD3_ASSERT_SIMPLE {
            assert!($($arg)*);
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! ad3_assert_eq_simple {
    ($($arg:tt)*) => {
        if $crate::asserts::AD3_ASSERT_LEVEL_DEFINITION >= $crate::asserts::AD3_ASSERT_SIMPLE {
            assert_eq!($($arg)*);
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! ad3_assert_moderate {
    ($($arg:tt)*) => {
        if $crate::asserts::AD3_ASSERT_LEVEL_DEFINITION >= $crate::asserts::AD3_ASSERT_MODERATE {
            assert!($($arg)*);
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! ad3_assert_advanced {
    ($($arg:tt)*) => {
        if $crate::asserts::AD3_ASSERT_LEVEL_DEFINITION >= $crate::asserts::AD3_ASSERT_ADVANCED {
            assert!($($arg)*);
        }
    };
}
