/// Binds a model to a table so that [crate::database::Record] can infer the table name.
#[macro_export]
macro_rules! define_table {
    ($table:literal : $model:ty = $id:ident) => {
        impl $crate::database::Id for $model {
            fn id(&self) -> &$crate::database::Thing {
                self.$id.as_ref()
            }

            fn table() -> &'static str {
                $table
            }
        }
    };
}

/// Defines a method to query the database using SQL.
///
/// # Syntax
/// ```text
/// [Base Type] > method_name(...arguments) > [Output Type] where "sql query"
/// ```
/// Where the `Base Type` is the type that the method is being defined for and the `Output Type` is the type that the method will return.
/// Every argument is bound to the query under its own name.
///
/// # Example
///
/// ```text
/// define_relation! {
///     Video > get(id: Record<Video>) > Option<Video>
///         where "SELECT * FROM $id"
/// }
///
/// let video = Video::get(id, &db).await?;
/// ```
#[macro_export]
macro_rules! define_relation {
    ($model:ty > $relation:ident ($($binding:ident : $binding_type:ty),*) > $export:ty where $query:literal) => {
        impl $model {
            pub async fn $relation($($binding : $binding_type ,)* db: &$crate::database::Database) -> $crate::database::Result<$export> {
                db.sql($query)
                    $(.bind((stringify!($binding), $binding)))*
                    .fetch()
                    .await
            }
        }
    };
}

/// Defines a validated string identifier.
///
/// The generated type only admits non-empty ASCII alphanumerics, `-` and `_`, so it can never
/// contain the separator used by [crate::keys].
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $error:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = $error;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                Self::try_from(input.to_string())
            }
        }

        impl TryFrom<String> for $name {
            type Error = $error;

            fn try_from(text: String) -> Result<Self, Self::Error> {
                if $crate::model::is_valid_id(&text) {
                    Ok(Self(text))
                } else {
                    Err($error { text })
                }
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[derive(Debug, Clone, PartialEq, Eq, snafu::Snafu)]
        #[snafu(display("`{text}` is not a valid {}", $kind))]
        pub struct $error {
            pub text: String,
        }
    };
}
