use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct};

/// Attribute macro that marks a struct as a structured agent output.
///
/// Adds serde (both directions) and schemars::JsonSchema derives so the type can be
/// advertised to an executor as an output schema and read back from its reply.
#[proc_macro_attribute]
pub fn structured_output(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    let vis = &input.vis;
    let ident = &input.ident;
    let generics = &input.generics;
    let fields = &input.fields;
    let attrs = &input.attrs;
    let semi = match fields {
        syn::Fields::Named(_) => quote! {},
        _ => quote! { ; },
    };

    let expanded: proc_macro2::TokenStream = quote! {
        #[derive(serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
        #(#attrs)*
        #vis struct #ident #generics #fields #semi
    };
    expanded.into()
}
