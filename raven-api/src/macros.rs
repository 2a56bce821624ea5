//! Declarative macros for catalogue entries
//!
//! Each gateway command is a plain request struct plus a trait impl. The
//! macros below generate both from the wire name, the request fields and
//! the argument list.

/// Define a command the gateway does not answer
///
/// ```rust,ignore
/// define_command! {
///     /// Restart the gateway
///     command: Restart,
///     name: "restart",
///     request: {},
///     arguments: |_request| Ok(Arguments::new()),
/// }
/// ```
macro_rules! define_command {
    (
        $(#[$meta:meta])*
        command: $command:ident,
        name: $name:literal,
        request: {
            $($(#[$field_meta:meta])* $field:ident: $field_type:ty),* $(,)?
        },
        arguments: |$request:ident| $arguments:expr $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        pub struct $command {
            $($(#[$field_meta])* pub $field: $field_type,)*
        }

        impl $crate::command::RavenCommand for $command {
            const NAME: &'static str = $name;

            fn arguments(&self) -> $crate::error::Result<$crate::command::Arguments> {
                let $request = self;
                $arguments
            }
        }
    };
}

/// Define a command answered by one reply fragment
///
/// The reply root comes from the response type's
/// [`FromFields::ROOT`](crate::command::FromFields::ROOT).
macro_rules! define_query {
    (
        $(#[$meta:meta])*
        query: $query:ident,
        name: $name:literal,
        request: {
            $($(#[$field_meta:meta])* $field:ident: $field_type:ty),* $(,)?
        },
        arguments: |$request:ident| $arguments:expr,
        response: $response:ty $(,)?
    ) => {
        define_command! {
            $(#[$meta])*
            command: $query,
            name: $name,
            request: {
                $($(#[$field_meta])* $field: $field_type),*
            },
            arguments: |$request| $arguments,
        }

        impl $crate::command::RavenQuery for $query {
            type Response = $response;
        }
    };
}
