/// Same macro as in `assert_hex` crate, but use `{:02X?}` instead of `{:#x}` because the alternate formatting
/// for slice / Vec is inserting a newline between each element which is not very readable for binary payloads.
///
/// [Original macro](https://docs.rs/assert_hex/latest/src/assert_hex/lib.rs.html#19).
#[macro_export]
macro_rules! assert_eq_hex {
    ($left:expr, $right:expr $(,)?) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    panic!(r#"assertion failed: `(left == right)`
  left: `{:02X?}`,
 right: `{:02X?}`"#, &*left_val, &*right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    panic!(r#"assertion failed: `(left == right)`
  left: `{:02X?}`,
 right: `{:02X?}`: {}"#, &*left_val, &*right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

#[macro_export]
macro_rules! encode_decode_test {
    ($test_name:ident : $pdu:expr , $encoded_pdu:expr) => {
        $crate::paste! {
            #[test]
            fn [< $test_name _encode >]() {
                let pdu = $pdu;
                let expected = $encoded_pdu;

                let encoded = ::cloudrdp_core::encode_vec(&pdu).unwrap();

                $crate::assert_eq_hex!(encoded, expected);
            }

            #[test]
            fn [< $test_name _decode >]() {
                let encoded = $encoded_pdu;
                let expected = $pdu;

                let decoded = ::cloudrdp_core::decode(&encoded).unwrap();

                let _ = expected == decoded; // type inference trick

                $crate::assert_eq_hex!(decoded, expected);
            }

            #[test]
            fn [< $test_name _size >]() {
                let pdu = $pdu;
                let expected = $encoded_pdu.len();

                let pdu_size = ::cloudrdp_core::size(&pdu);

                $crate::assert_eq_hex!(pdu_size, expected);
            }
        }
    };
    ($( $test_name:ident : $pdu:expr , $encoded_pdu:expr ; )+) => {
        $(
            $crate::encode_decode_test!($test_name: $pdu, $encoded_pdu);
        )+
    };
}
