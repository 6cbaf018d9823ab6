/// Declares a public tuple struct wrapping `$type`, with `new`, `Deref` and `From` for unwrapping.
macro_rules! new_type {
    (
        $(#[$attr:meta])*
        $name:ident(
            $(#[$type_attr:meta])*
            $type:ty
        )
    ) => {
        $(#[$attr])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(
            $(#[$type_attr])*
            $type
        );
        impl $name {
            #[doc = concat!("Wraps the given `", stringify!($type), "`.")]
            pub const fn new(value: $type) -> Self {
                $name(value)
            }
        }
        impl std::ops::Deref for $name {
            type Target = $type;
            fn deref(&self) -> &$type {
                &self.0
            }
        }
        impl From<$name> for $type {
            fn from(value: $name) -> $type {
                value.0
            }
        }
    };
}

/// Like `new_type!`, but the value is only reachable through `secret()` and is redacted from
/// `Debug` output.
macro_rules! new_secret_type {
    (
        $(#[$attr:meta])*
        $name:ident($type:ty)
    ) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq)]
        pub struct $name($type);
        impl $name {
            #[doc = concat!("Wraps the given secret `", stringify!($type), "`.")]
            pub fn new(value: $type) -> Self {
                $name(value)
            }
            #[doc = concat!("Returns the secret value of this `", stringify!($name), "`.")]
            pub fn secret(&self) -> &$type {
                &self.0
            }
        }
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "([redacted])"))
            }
        }
    };
}

/// Declares an absolute URL type.
///
/// The wrapper keeps the original string alongside the parsed [`url::Url`]. Comparison, hashing,
/// `Display` and serde all use the original string, so values round-trip without being
/// normalized.
macro_rules! new_url_type {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Clone)]
        pub struct $name(url::Url, String);
        impl $name {
            #[doc = concat!("Parses a `", stringify!($name), "`, which must be an absolute URL.")]
            pub fn new(url: String) -> Result<Self, url::ParseError> {
                Ok($name(url::Url::parse(&url)?, url))
            }
            #[doc = concat!("Wraps an already parsed URL as a `", stringify!($name), "`.")]
            pub fn from_url(url: url::Url) -> Self {
                let raw = url.to_string();
                $name(url, raw)
            }
            /// Returns the parsed URL.
            pub fn url(&self) -> &url::Url {
                &self.0
            }
        }
        impl std::ops::Deref for $name {
            type Target = String;
            fn deref(&self) -> &String {
                &self.1
            }
        }
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.1).finish()
            }
        }
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(&self.1)
            }
        }
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::de::Deserializer<'de>,
            {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::new(raw).map_err(serde::de::Error::custom)
            }
        }
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.1)
            }
        }
        impl std::hash::Hash for $name {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&self.1, state)
            }
        }
        impl Ord for $name {
            fn cmp(&self, other: &$name) -> std::cmp::Ordering {
                self.1.cmp(&other.1)
            }
        }
        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &$name) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl PartialEq for $name {
            fn eq(&self, other: &$name) -> bool {
                self.1 == other.1
            }
        }
        impl Eq for $name {}
    };
}

macro_rules! field_getters_setters {
    (@getter $self:ident [$zero:expr] [$doc:expr] $field:ident bool) => {
        #[doc = concat!("Returns whether ", $doc, ".")]
        pub fn $field(&$self) -> bool {
            $zero.$field
        }
    };
    (@getter $self:ident [$zero:expr] [$doc:expr] $field:ident Option < $type:ty >) => {
        #[doc = concat!("Returns the ", $doc, ", if any.")]
        pub fn $field(&$self) -> Option<&$type> {
            $zero.$field.as_ref()
        }
    };
    (@getter $self:ident [$zero:expr] [$doc:expr] $field:ident $type:ty) => {
        #[doc = concat!("Returns the ", $doc, ".")]
        pub fn $field(&$self) -> &$type {
            &$zero.$field
        }
    };
    (@setter $self:ident [$zero:expr] [$doc:expr] $setter:ident $field:ident bool) => {
        #[doc = concat!("Sets whether ", $doc, ".")]
        pub fn $setter(mut $self, $field: bool) -> Self {
            $zero.$field = $field;
            $self
        }
    };
    (@setter $self:ident [$zero:expr] [$doc:expr] $setter:ident $field:ident $type:ty) => {
        #[doc = concat!("Sets the ", $doc, ".")]
        pub fn $setter(mut $self, $field: $type) -> Self {
            $zero.$field = $field;
            $self
        }
    };
    // Main entry point
    (
        pub $self:ident [$zero:expr] {
            $(
                $setter:ident -> $field:ident[$($entry:tt)+] [$doc:expr],
            )+
        }
    ) => {
        $(
            field_getters_setters![@getter $self [$zero] [$doc] $field $($entry)+];

            field_getters_setters![@setter $self [$zero] [$doc] $setter $field $($entry)+];
        )+
    };
}
