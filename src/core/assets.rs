//! Stock transform programs embedded at compile time.
//!
//! Programs under `transforms/` are baked into the binary so the CLI works
//! without any external files. Each program migrates one document version
//! to the next and is keyed by its `(from, to)` pair.

/// Macro to embed transform programs at compile time.
///
/// Generates:
/// - Public constants for each embedded program
/// - `get_program(from, to)` for lookup
/// - `list_programs()` for discovery
macro_rules! stock_programs {
    ($(($from:literal, $to:literal) => $path:expr => $const_name:ident),* $(,)?) => {
        $(
            pub const $const_name: &str =
                include_str!(concat!("../../transforms/", $path));
        )*

        pub fn get_program(from: i32, to: i32) -> Option<&'static str> {
            match (from, to) {
                $( ($from, $to) => Some($const_name), )*
                _ => None,
            }
        }

        pub fn list_programs() -> Vec<(i32, i32)> {
            vec![ $( ($from, $to), )* ]
        }
    };
}

stock_programs! {
    (1, 2) => "migrate_1_2.toml" => STOCK_MIGRATE_1_2,
    (2, 3) => "migrate_2_3.toml" => STOCK_MIGRATE_2_3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::TransformProgram;

    #[test]
    fn listed_programs_resolve_and_parse() {
        for (from, to) in list_programs() {
            let text = get_program(from, to).expect("listed program should resolve");
            let program = TransformProgram::parse(text).expect("stock program should parse");
            assert!(!program.rules().is_empty());
        }
    }

    #[test]
    fn unknown_pair_is_none() {
        assert!(get_program(98, 99).is_none());
    }
}
