/// Declares an enum of SQLSTATE codes with `Display`, serde support and a
/// `get_obj_by_state` lookup from the five character code.
#[macro_export]
macro_rules! sqlstate_mapping {
    (
        $objectname:ident,
        $(
            $(#[$docs:meta])*
            ($phrase:ident, $state:expr);
        )+
    ) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, serde::Serialize, serde::Deserialize)]
        #[allow(non_upper_case_globals)]
        #[allow(non_camel_case_types)]
        pub enum $objectname {
            $(
                $(#[$docs])*
                #[serde(rename = $state)]
                $phrase,
            )+
        }

        impl std::fmt::Display for $objectname {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$phrase => write!(f, $state),
                    )+
                }
            }
        }

        #[allow(unreachable_patterns)]
        pub fn get_obj_by_state(state: &str) -> Option<$objectname> {
            match state {
                $(
                    $state => Some($objectname::$phrase),
                )+
                _ => None
            }
        }
    }
}
