mod record;

use proc_macro::TokenStream;

/// Derive macro for the `Record` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[record(collection = "messages")]
/// struct ChatMessage {
///     #[record(id)]
///     pub id: String,
///     #[record(created_at)]
///     pub created_at: u64,
///     pub content: String,
/// }
/// ```
///
/// The collection defaults to the snake_case struct name plus `s`. The id
/// field defaults to a field named `id` and the sort key to a field named
/// `created_at`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
