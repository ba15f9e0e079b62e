use validator::{Validate, ValidationError, ValidationErrors};

/// Human readable reasons a submitted form was refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<String>);

impl FormErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        let messages = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();

        Self(messages)
    }
}

/// Runs the derived rules, then `extra` for anything they can't express.
pub fn check<F>(form: &impl Validate, extra: F) -> Result<(), FormErrors>
where
    F: FnOnce(&mut ValidationErrors),
{
    let mut errors = form.validate().err().unwrap_or_else(ValidationErrors::new);
    extra(&mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

/// Refuses `value` if it is empty or only whitespace.
pub fn required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    message: &'static str,
) {
    if !value.trim().is_empty() {
        return;
    }

    let mut e = ValidationError::new("required");
    e.message = Some(message.into());
    errors.add(field, e);
}
