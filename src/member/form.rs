//! The member form shared by the create and edit pages.

use maud::{Markup, html};

use crate::{
    Error,
    auth::PasswordHash,
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, image_input, money_input},
    image::MultipartForm,
    member::core::{MemberUpdate, NewMember},
    money::Money,
};

/// The name of the file input for the member's photo.
pub const PHOTO_FIELD: &str = "photo";

/// The values to prefill the form with.
#[derive(Debug, Default)]
pub struct MemberFormValues<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub photo_url: Option<&'a str>,
}

fn text_input(name: &str, label: &str, value: &str, type_: &str, required: bool) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            input
                type=(type_)
                name=(name)
                id=(name)
                value=(value)
                required[required]
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}

/// The inputs of the member form.
///
/// The initial credit input is only shown on creation, after that the credit
/// changes through the ledger or the administrator's override.
pub fn member_form_fields(values: &MemberFormValues, show_initial_credit: bool) -> Markup {
    html! {
        (text_input("name", "Nome", values.name, "text", true))
        (text_input("username", "Usuário", values.username, "text", true))
        (text_input("email", "E-mail", values.email, "email", false))

        @if show_initial_credit {
            (money_input("initial_credit", "Crédito inicial", "0,00"))
        }

        div
        {
            label for="password" class=(FORM_LABEL_STYLE) { "Senha" }

            input
                type="password"
                name="password"
                id="password"
                placeholder="Deixe em branco para não alterar"
                autocomplete="new-password"
                class=(FORM_TEXT_INPUT_STYLE);
        }

        (image_input(PHOTO_FIELD, "Foto", values.photo_url))
    }
}

/// Hash the optional password field, checking its strength against the
/// member's other details.
fn password_hash(
    form: &MultipartForm,
    name: &str,
    username: &str,
) -> Result<Option<PasswordHash>, Error> {
    form.text("password")
        .map(|password| {
            PasswordHash::from_raw_password(password, &[name, username], PasswordHash::DEFAULT_COST)
        })
        .transpose()
}

/// Read a [NewMember] from the submitted form.
pub fn new_member_from_form(mut form: MultipartForm) -> Result<NewMember, Error> {
    let name = form.required_text("name", "Nome")?.to_owned();
    let username = form.required_text("username", "Usuário")?.to_owned();
    let initial_credit = match form.text("initial_credit") {
        Some(credit) => Money::parse(credit)?,
        None => Money::ZERO,
    };
    let email = form.text("email").map(str::to_owned);
    let password_hash = password_hash(&form, &name, &username)?;

    Ok(NewMember {
        name,
        username,
        initial_credit,
        email,
        password_hash,
        photo: form.image.take(),
    })
}

/// Read a [MemberUpdate] from the submitted form.
pub fn member_update_from_form(mut form: MultipartForm) -> Result<MemberUpdate, Error> {
    let name = form.required_text("name", "Nome")?.to_owned();
    let username = form.required_text("username", "Usuário")?.to_owned();
    let email = form.text("email").map(str::to_owned);
    let password_hash = password_hash(&form, &name, &username)?;

    Ok(MemberUpdate {
        name,
        username,
        email,
        password_hash,
        photo: form.image.take(),
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        image::{
            MultipartForm,
            test_multipart::{PNG_BYTES, Part, must_make_multipart},
        },
        money::Money,
    };

    use super::{PHOTO_FIELD, member_update_from_form, new_member_from_form};

    async fn read(parts: &[Part<'_>]) -> MultipartForm {
        MultipartForm::read(must_make_multipart(parts).await, PHOTO_FIELD)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reads_new_member_with_photo() {
        let form = read(&[
            Part::Text("name", " Maria "),
            Part::Text("username", "maria"),
            Part::Text("initial_credit", "150,50"),
            Part::Text("email", ""),
            Part::Text("password", ""),
            Part::File(PHOTO_FIELD, "maria.png", PNG_BYTES),
        ])
        .await;

        let new_member = new_member_from_form(form).unwrap();

        assert_eq!(new_member.name, "Maria");
        assert_eq!(new_member.initial_credit, Money::from_cents(15050));
        assert_eq!(new_member.email, None);
        assert_eq!(new_member.password_hash, None);
        assert_eq!(
            new_member.photo.map(|photo| photo.mime_type),
            Some("image/png".to_owned())
        );
    }

    #[tokio::test]
    async fn blank_initial_credit_is_zero() {
        let form = read(&[Part::Text("name", "Maria"), Part::Text("username", "maria")]).await;

        let new_member = new_member_from_form(form).unwrap();

        assert_eq!(new_member.initial_credit, Money::ZERO);
        assert!(new_member.photo.is_none());
    }

    #[tokio::test]
    async fn missing_name_is_rejected() {
        let form = read(&[Part::Text("name", "  "), Part::Text("username", "maria")]).await;

        assert_eq!(new_member_from_form(form), Err(Error::MissingField("Nome")));
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let form = read(&[
            Part::Text("name", "Maria"),
            Part::Text("username", "maria"),
            Part::Text("password", "maria"),
        ])
        .await;

        assert!(matches!(
            member_update_from_form(form),
            Err(Error::TooWeak(_))
        ));
    }
}
