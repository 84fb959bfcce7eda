//! Fixed extraction prompt.
//!
//! The schema the model must produce is frozen here; any field change must
//! move in lockstep with [`crate::llm::schema::ModelPayload`].

/// Documents are truncated before prompting. Disclosure PDFs front-load the
/// operative facts; the tail is boilerplate and signature blocks.
pub(crate) const MAX_PROMPT_CHARS: usize = 12_000;

pub(crate) const SYSTEM_PROMPT: &str = "\
You are an extraction engine for Brazilian real-estate fund (FII) regulatory \
disclosures. You receive the plain text of one filing (Portuguese) and must \
return ONLY a JSON object, no prose, no markdown fences, with exactly these \
fields:\n\
  \"fund_code\": the fund ticker as written in the document (e.g. \"ABCD11\"),\n\
  \"event_type\": one of \"distribution\", \"offering\", \"incorporation\", \
\"amortization\", \"other\",\n\
  \"event_date\": the event date in ISO format YYYY-MM-DD,\n\
  \"monetary_amount\": the per-share or total amount in BRL as a JSON number \
with a dot decimal separator (e.g. 0.50), or null when the filing carries no \
amount,\n\
  \"summary_text\": one sentence in Portuguese summarizing the event.\n\
Use null only for monetary_amount. Never invent values; prefer the ticker \
printed in the document header.";

/// Builds the user message for one document.
pub(crate) fn build_user_prompt(text: &str, listed_code: &str) -> String {
    let clipped: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    format!(
        "Fund ticker according to the listing page: {listed_code}\n\
         --- DOCUMENT TEXT ---\n{clipped}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_is_clipped() {
        let long = "x".repeat(MAX_PROMPT_CHARS * 2);
        let prompt = build_user_prompt(&long, "ABCD11");
        assert!(prompt.chars().count() < MAX_PROMPT_CHARS + 200);
        assert!(prompt.contains("ABCD11"));
    }
}
