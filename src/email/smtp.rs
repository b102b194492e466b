/// SMTP email sending implementation
use super::{EmailError, EmailResult};
use crate::app_config::EmailConfig;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Send an email via SMTP
pub async fn send_email(
    config: &EmailConfig,
    to: &str,
    subject: &str,
    body_text: &str,
    body_html: Option<&str>,
) -> EmailResult<()> {
    let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
        .parse()
        .map_err(|e| EmailError::ConfigError(format!("Invalid from address: {}", e)))?;

    let to_string = to.to_string();
    let to: Mailbox = to
        .parse()
        .map_err(|e| EmailError::ConfigError(format!("Invalid to address: {}", e)))?;

    let email_builder = Message::builder().from(from).to(to).subject(subject);

    let email = if let Some(html) = body_html {
        email_builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(body_text.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.to_string()),
                ),
        )?
    } else {
        email_builder
            .header(ContentType::TEXT_PLAIN)
            .body(body_text.to_string())?
    };

    let mut builder = if config.smtp_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };
    builder = builder.port(config.smtp_port);
    if !config.smtp_username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ));
    }

    builder.build().send(email).await?;

    log::info!("Email sent successfully to: {}", to_string);

    Ok(())
}
