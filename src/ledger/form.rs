//! Form fields shared by the create and edit entry forms.

use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    Error,
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, money_input},
    money::Money,
};

/// The fields an establishment fills in for an entry.
///
/// The amount is text so that both "12,50" and "12.50" are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFormData {
    pub amount: String,
    pub order_number: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl EntryFormData {
    /// Parse the amount typed in the form.
    pub fn parse_amount(&self) -> Result<Money, Error> {
        Money::parse(&self.amount)
    }
}

/// The amount, order number and description inputs, prefilled with `values`.
pub fn entry_form_fields(amount: &str, order_number: &str, description: &str) -> Markup {
    html! {
        (money_input("amount", "Valor", amount))

        div
        {
            label for="order_number" class=(FORM_LABEL_STYLE) { "Nº OS" }

            input
                type="text"
                name="order_number"
                id="order_number"
                placeholder="Número da ordem de serviço"
                required
                value=(order_number)
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label for="description" class=(FORM_LABEL_STYLE) { "Descrição" }

            input
                type="text"
                name="description"
                id="description"
                placeholder="Opcional"
                value=(description)
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}
