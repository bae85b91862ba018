//! Parameter binding for parameterized statements.
//!
//! One `bind` function per backend, each with the same shape so the executor
//! macros can call `params::<backend>::bind` without knowing which one it is.

macro_rules! impl_bind {
    ($name:ident, $db:ty) => {
        pub(crate) mod $name {
            use crate::models::QueryParam;
            use sqlx::query::Query;

            type Arguments<'q> = <$db as sqlx::Database>::Arguments<'q>;

            /// Bind one parameter, in order, to `query`.
            pub(crate) fn bind<'q>(
                query: Query<'q, $db, Arguments<'q>>,
                param: &'q QueryParam,
            ) -> Query<'q, $db, Arguments<'q>> {
                match param {
                    QueryParam::Null => query.bind(None::<String>),
                    QueryParam::Bool(v) => query.bind(*v),
                    QueryParam::Int(v) => query.bind(*v),
                    QueryParam::Float(v) => query.bind(*v),
                    QueryParam::String(v) => query.bind(v.as_str()),
                    QueryParam::Bytes(v) => query.bind(v.as_slice()),
                }
            }
        }
    };
}

impl_bind!(mysql, sqlx::MySql);
impl_bind!(postgres, sqlx::Postgres);
impl_bind!(sqlite, sqlx::Sqlite);
