//! Minimal reader for UWS job documents.
//!
//! Only two elements are ever needed from a job representation: the job
//! identifier and its phase. Both are matched by local name inside the UWS
//! namespace; documents that omit the namespace declaration are accepted
//! too, since some servers emit bare `<jobId>` elements.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{TapError, TapResult};
use crate::status::QueryStatus;

/// XML namespace of UWS 1.x documents.
pub const UWS_NAMESPACE: &[u8] = b"http://www.ivoa.net/xml/UWS/v1.0";

/// Extract the text of the first `uws:<local_name>` element.
fn element_text(xml: &str, local_name: &'static str) -> TapResult<String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                inside = match ns {
                    ResolveResult::Bound(Namespace(uri)) => uri == UWS_NAMESPACE,
                    ResolveResult::Unbound => true,
                    ResolveResult::Unknown(_) => false,
                };
            }
            (_, Event::Empty(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                return Err(TapError::MissingElement(local_name));
            }
            (_, Event::Text(t)) if inside => {
                let text = t.unescape()?.trim().to_string();
                if text.is_empty() {
                    return Err(TapError::MissingElement(local_name));
                }
                return Ok(text);
            }
            (_, Event::CData(c)) if inside => {
                let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                if text.is_empty() {
                    return Err(TapError::MissingElement(local_name));
                }
                return Ok(text);
            }
            (_, Event::End(_)) if inside => {
                return Err(TapError::MissingElement(local_name));
            }
            (_, Event::Eof) => return Err(TapError::MissingElement(local_name)),
            _ => {}
        }
    }
}

/// Read the job identifier from a job document.
pub fn parse_job_id(xml: &str) -> TapResult<String> {
    element_text(xml, "jobId")
}

/// Read and classify the phase of a job document.
pub fn parse_phase(xml: &str) -> TapResult<QueryStatus> {
    let phase = element_text(xml, "phase")?;
    QueryStatus::from_phase(&phase)
}
