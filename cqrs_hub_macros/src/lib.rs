mod live_model;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(LiveModel)] derive macro
// ============================================================================

/// Derive macro for the `LiveModel` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, LiveModel)]
/// #[live_model(name = "person")]
/// struct Person {
///     #[live_model(id)]
///     pub id: String,
///     pub personname: String,
/// }
/// ```
///
/// - `#[live_model(name = "...")]` sets the model name events are routed by.
///   If omitted, defaults to the snake_case struct name.
/// - `#[live_model(id)]` marks the field holding the instance id. The field
///   must implement `Display`. If omitted, defaults to a field named `id`.
///
/// The default `apply` (shallow JSON merge) is inherited from the trait.
#[proc_macro_derive(LiveModel, attributes(live_model))]
pub fn derive_live_model(input: TokenStream) -> TokenStream {
    live_model::derive_live_model(input)
}
