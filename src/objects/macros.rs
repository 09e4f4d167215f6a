//! Macros for reducing domain object boilerplate.
//!
//! Albums and tracks expose one accessor per collection column. The accessor
//! answers from its cache, falls back to the column default for objects
//! without a backing row, and otherwise reads the column once.

/// Generates the memoized field set, the field enum and the accessors of a
/// domain object.
///
/// The owner type must have `id: Option<ItemId>`, `collection: Collection`
/// and `fields: $fields` members.
///
/// # Usage
///
/// ```ignore
/// lazy_fields! {
///     Album, AlbumFields, AlbumField {
///         name(Name): String = String::new() => Collection::album_name;
///     }
/// }
/// ```
macro_rules! lazy_fields {
    (
        $owner:ident, $fields:ident, $field_enum:ident {
            $(
                $(#[$meta:meta])*
                $name:ident($variant:ident): $ty:ty = $default:expr => $loader:expr;
            )+
        }
    ) => {
        /// Memoized column values.
        #[derive(Debug, Clone, Default)]
        pub(crate) struct $fields {
            $( $name: $crate::objects::lazy::Lazy<$ty>, )+
        }

        /// Columns whose cached value can be reset.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $field_enum {
            $( $variant, )+
        }

        impl $owner {
            $(
                $(#[$meta])*
                pub fn $name(&self) -> $crate::error::Result<$ty> {
                    if let Some(value) = self.fields.$name.get() {
                        return Ok(value);
                    }
                    match $crate::types::row_id(self.id) {
                        None => Ok($default),
                        Some(id) => self.fields.$name.get_or_load(|| {
                            let loaded: Option<$ty> = ($loader)(&self.collection, id)?;
                            Ok(loaded.unwrap_or_else(|| $default))
                        }),
                    }
                }
            )+

            /// Forget a cached column so the next access reads the collection again.
            pub fn reset(&mut self, field: $field_enum) {
                match field {
                    $( $field_enum::$variant => self.fields.$name.clear(), )+
                }
            }
        }
    };
}
