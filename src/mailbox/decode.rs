// The `decode` module turns a raw RFC 822 message into an `EmailMessage`.

use crate::mailbox::{EmailMessage, MailError};
use chrono::DateTime;
use encoding_rs::{Encoding, UTF_8};
use mailparse::{MailHeader, MailHeaderMap, ParsedMail};

/// Charset assumed for headers whose subject carries no encoded word.
pub const DEFAULT_FALLBACK_ENCODING: &str = "iso-2022-jp";

/// Layout of [`EmailMessage::date`].
pub const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Resolves a charset label such as `"ISO-2022-JP"` or `"utf8"`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    // RFC 2231 language suffix: "utf-8*ja"
    let label = label.split('*').next().unwrap_or(label);
    Encoding::for_label(label.trim().as_bytes())
}

/// Charset named by the first encoded word of a raw header, if any.
pub fn header_charset(raw: &[u8]) -> Option<&'static Encoding> {
    let text = String::from_utf8_lossy(raw);
    let start = text.find("=?")? + 2;
    let label = text[start..].split('?').next()?;
    encoding_for_label(label)
}

/// Raw 8-bit or ISO-2022-JP header bytes, which mailparse would read as
/// Latin-1. Valid UTF-8 stays UTF-8; bytes the header charset cannot decode
/// get a lossy UTF-8 pass instead.
fn decode_raw(bytes: &[u8], charset: &'static Encoding) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !bytes.contains(&0x1b) => text.to_string(),
        _ => {
            let (text, had_errors) = charset.decode_without_bom_handling(bytes);
            if had_errors {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                text.into_owned()
            }
        }
    }
}

/// Decodes one `From` or `Subject` header.
///
/// Encoded words go through mailparse, which joins adjacent words and
/// unfolds continuation lines. A header carrying raw non-ASCII bytes is
/// decoded as a whole with `charset`. Decoding never fails.
pub fn decode_header(header: &MailHeader<'_>, charset: &'static Encoding) -> String {
    let raw = header.get_value_raw();
    let decoded = if raw.iter().any(|&b| b >= 0x80 || b == 0x1b) {
        decode_raw(raw, charset)
    } else {
        header.get_value()
    };
    decoded.trim().to_string()
}

/// Normalizes a `Date` header to [`DATE_FORMAT`], keeping the sender's offset.
///
/// Falls back to a lenient parse in UTC, then to the header text itself.
pub fn normalize_date(value: &str) -> String {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return date.format(DATE_FORMAT).to_string();
    }
    mailparse::dateparse(value)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| value.to_string())
}

fn is_multipart(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/")
}

fn first_plain_part(part: &ParsedMail<'_>) -> Option<String> {
    part.subparts.iter().find_map(|sub| {
        if sub.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            Some(sub.get_body().unwrap_or_default())
        } else if is_multipart(sub) {
            first_plain_part(sub)
        } else {
            None
        }
    })
}

/// Plain-text body. A multipart message without any `text/plain` part has an
/// empty body, even when it carries HTML.
fn plain_text_body(message: &ParsedMail<'_>) -> String {
    if is_multipart(message) {
        first_plain_part(message).unwrap_or_default()
    } else {
        message.get_body().unwrap_or_default()
    }
}

/// Decodes one fetched message.
///
/// `fallback` is the header charset used when the subject does not name one.
pub fn decode_message(raw: &[u8], fallback: &'static Encoding) -> Result<EmailMessage, MailError> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| MailError::Parse(e.to_string()))?;
    let headers = &parsed.headers;

    let subject_header = headers.get_first_header("Subject");
    let charset = subject_header
        .and_then(|h| header_charset(h.get_value_raw()))
        .unwrap_or(fallback);

    let from = headers
        .get_first_header("From")
        .map(|h| decode_header(h, charset))
        .unwrap_or_default();
    let subject = subject_header
        .map(|h| decode_header(h, charset))
        .unwrap_or_default();
    let date = headers
        .get_first_value("Date")
        .map(|d| normalize_date(&d))
        .unwrap_or_default();

    Ok(EmailMessage {
        from,
        subject,
        date,
        body: plain_text_body(&parsed),
    })
}

/// The documented fallback charset.
pub fn default_fallback() -> &'static Encoding {
    encoding_for_label(DEFAULT_FALLBACK_ENCODING).unwrap_or(UTF_8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{ISO_2022_JP, WINDOWS_1252};

    fn decode_header_value(raw: &[u8], charset: &'static Encoding) -> String {
        let line = [b"Subject: ".as_slice(), raw].concat();
        let (header, _) = mailparse::parse_header(&line).unwrap();
        decode_header(&header, charset)
    }

    #[test]
    fn concatenates_encoded_words_in_order() {
        let raw = b"=?UTF-8?B?5piO5pel44Gu?= =?UTF-8?B?5Lya6K2w?=";
        assert_eq!(decode_header_value(raw, UTF_8), "明日の会議");
    }

    #[test]
    fn keeps_text_around_encoded_words() {
        let raw = b"Re: =?UTF-8?B?5piO5pel44Gu?= 10:00 =?utf-8?Q?caf=C3=A9_time?=";
        assert_eq!(decode_header_value(raw, UTF_8), "Re: 明日の 10:00 café time");
    }

    #[test]
    fn decodes_folded_iso_2022_jp_words() {
        let raw = b"=?ISO-2022-JP?B?GyRCQkckQTlnJG8kOxsoQg==?=\r\n =?ISO-2022-JP?B?GyRCMnE1RBsoQg==?=";
        assert_eq!(decode_header_value(raw, UTF_8), "打ち合わせ会議");
    }

    #[test]
    fn decodes_address_with_encoded_name() {
        let raw = b"=?UTF-8?B?5bGx55Sw5aSq6YOO?= <taro@example.jp>";
        assert_eq!(
            decode_header_value(raw, ISO_2022_JP),
            "山田太郎 <taro@example.jp>"
        );
    }

    #[test]
    fn raw_iso_2022_jp_uses_header_charset() {
        let raw = b"\x1b$B2q5D\x1b(B";
        assert_eq!(decode_header_value(raw, ISO_2022_JP), "会議");
    }

    #[test]
    fn raw_8bit_bytes_use_header_charset() {
        assert_eq!(decode_header_value(b"caf\xe9 time", WINDOWS_1252), "café time");
    }

    #[test]
    fn raw_8bit_bytes_outside_header_charset_are_decoded_lossily() {
        let decoded = decode_header_value(b"caf\xe9 time", ISO_2022_JP);
        assert_eq!(decoded, "caf\u{FFFD} time");
    }

    #[test]
    fn malformed_word_is_kept_verbatim() {
        let raw = b"=?UTF-8?X?abc?= tail";
        assert_eq!(decode_header_value(raw, UTF_8), "=?UTF-8?X?abc?= tail");
    }

    #[test]
    fn detects_header_charset_from_first_word() {
        assert_eq!(
            header_charset(b"=?ISO-2022-JP?B?GyRCMnE1RBsoQg==?="),
            Some(ISO_2022_JP)
        );
        assert_eq!(header_charset(b"Plain subject"), None);
        assert_eq!(default_fallback(), ISO_2022_JP);
    }

    #[test]
    fn normalizes_dates_in_sender_offset() {
        assert_eq!(
            normalize_date("Tue, 26 Dec 2023 10:15:00 +0900"),
            "2023/12/26 10:15:00"
        );
        assert_eq!(normalize_date("not a date"), "not a date");
    }

    #[test]
    fn multipart_without_plain_text_has_empty_body() {
        let raw = b"From: shop@example.com\r\n\
Subject: Sale\r\n\
Date: Tue, 26 Dec 2023 10:15:00 +0900\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>50% off</p>\r\n\
--b1--\r\n";
        let message = decode_message(raw, default_fallback()).unwrap();
        assert_eq!(message.body, "");
        assert_eq!(message.subject, "Sale");
    }

    #[test]
    fn multipart_uses_first_plain_text_part() {
        let raw = b"From: =?UTF-8?B?5bGx55Sw5aSq6YOO?= <taro@example.jp>\r\n\
Subject: =?UTF-8?B?5piO5pel44Gu?= =?UTF-8?B?5Lya6K2w?=\r\n\
Date: Tue, 26 Dec 2023 10:15:00 +0900\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Meeting at 3pm\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Meeting at 3pm</p>\r\n\
--inner--\r\n\
--outer--\r\n";
        let message = decode_message(raw, default_fallback()).unwrap();
        assert_eq!(message.from, "山田太郎 <taro@example.jp>");
        assert_eq!(message.subject, "明日の会議");
        assert_eq!(message.date, "2023/12/26 10:15:00");
        assert_eq!(message.body.trim(), "Meeting at 3pm");
    }

    #[test]
    fn single_part_body_is_used_directly() {
        let raw = b"From: a@example.com\r\nSubject: hi\r\n\r\nSee you Friday.\r\n";
        let message = decode_message(raw, default_fallback()).unwrap();
        assert_eq!(message.body.trim(), "See you Friday.");
        assert_eq!(message.date, "");
    }
}
