//! The establishment form shared by the create and edit pages.

use maud::{Markup, html};

use crate::{
    Error,
    auth::PasswordHash,
    establishment::core::{EstablishmentUpdate, NewEstablishment},
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, image_input},
    image::MultipartForm,
};

/// The name of the file input for the establishment's logo.
pub const LOGO_FIELD: &str = "logo";

/// The values to prefill the form with.
#[derive(Debug, Default)]
pub struct EstablishmentFormValues<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub logo_url: Option<&'a str>,
}

/// The inputs of the establishment form.
///
/// A new establishment must be given a password. When editing, a blank
/// password keeps the current one.
pub fn establishment_form_fields(
    values: &EstablishmentFormValues,
    password_required: bool,
) -> Markup {
    let password_placeholder = if password_required {
        ""
    } else {
        "Deixe em branco para não alterar"
    };

    html! {
        div
        {
            label for="name" class=(FORM_LABEL_STYLE) { "Nome" }
            input type="text" name="name" id="name" value=(values.name) required
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label for="username" class=(FORM_LABEL_STYLE) { "Usuário" }
            input type="text" name="username" id="username" value=(values.username) required
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label for="email" class=(FORM_LABEL_STYLE) { "E-mail" }
            input type="email" name="email" id="email" value=(values.email)
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div
        {
            label for="password" class=(FORM_LABEL_STYLE) { "Senha" }
            input
                type="password"
                name="password"
                id="password"
                placeholder=(password_placeholder)
                autocomplete="new-password"
                required[password_required]
                class=(FORM_TEXT_INPUT_STYLE);
        }

        (image_input(LOGO_FIELD, "Logo", values.logo_url))
    }
}

fn hash_password(password: &str, name: &str, username: &str) -> Result<PasswordHash, Error> {
    PasswordHash::from_raw_password(password, &[name, username], PasswordHash::DEFAULT_COST)
}

/// Read a [NewEstablishment] from the submitted form.
pub fn new_establishment_from_form(mut form: MultipartForm) -> Result<NewEstablishment, Error> {
    let name = form.required_text("name", "Nome")?.to_owned();
    let username = form.required_text("username", "Usuário")?.to_owned();
    let password = form.required_text("password", "Senha")?;
    let password_hash = hash_password(password, &name, &username)?;

    Ok(NewEstablishment {
        email: form.text("email").map(str::to_owned),
        name,
        username,
        password_hash,
        logo: form.image.take(),
    })
}

/// Read an [EstablishmentUpdate] from the submitted form.
pub fn establishment_update_from_form(
    mut form: MultipartForm,
) -> Result<EstablishmentUpdate, Error> {
    let name = form.required_text("name", "Nome")?.to_owned();
    let username = form.required_text("username", "Usuário")?.to_owned();
    let password_hash = form
        .text("password")
        .map(|password| hash_password(password, &name, &username))
        .transpose()?;

    Ok(EstablishmentUpdate {
        email: form.text("email").map(str::to_owned),
        name,
        username,
        password_hash,
        logo: form.image.take(),
    })
}
