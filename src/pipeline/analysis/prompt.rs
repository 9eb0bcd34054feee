/// Instruction for plain-text extraction of an attached document.
pub const EXTRACT_TEXT_PROMPT: &str = "\
Please extract all text content from this document. Return only the extracted text \
without any additional formatting, explanations, or metadata. If the document contains \
tables, preserve their structure using plain text formatting. If there are multiple \
columns, present them in a logical reading order.";

/// Instruction for fraud and consistency analysis of an attached claim document.
pub const CLAIM_ANALYSIS_PROMPT: &str = r#"
You are an insurance claims analyst. Review the attached claim document for
internal inconsistencies and fraud indicators.

Check in particular:
1. Dates that contradict each other (incident, report, treatment, invoice).
2. Amounts that do not add up or differ between sections.
3. Descriptions of the incident that change between statements.
4. Photos or attachments that do not match the described damage.
5. Missing information a legitimate claim would normally include.

Respond with ONLY a JSON object in exactly this shape, no other text:

{
  "isConsistent": true,
  "riskLevel": "low | medium | high",
  "flags": [
    {
      "type": "inconsistency | suspicious | missing_info | photo_mismatch | amount_discrepancy",
      "severity": "low | medium | high",
      "description": "short statement of the problem",
      "details": "evidence from the document"
    }
  ],
  "confidence": 0,
  "summary": "two or three sentence overall assessment",
  "extractedData": {
    "claimAmount": "amount as written, or omit",
    "incidentDate": "date as written, or omit",
    "policyNumber": "policy number as written, or omit",
    "description": "one sentence description of the incident, or omit"
  }
}

"confidence" is an integer from 0 to 100. Use an empty "flags" array when
nothing is wrong.
"#;

/// Build the coherence-check prompt for already-extracted claim text.
pub fn build_coherence_prompt(text: &str) -> String {
    format!(
        r#"You are an insurance claims analyst. Read the claim text below and decide
whether it is internally coherent: dates, amounts, parties, and the account of
the incident should agree with each other.

<claim_text>
{text}
</claim_text>

Respond with ONLY a JSON object in exactly this shape:

{{
  "isCoherent": true,
  "discrepancies": ["each contradiction found, as a short sentence"],
  "overallAssessment": "two or three sentence assessment",
  "confidence": 0
}}

"confidence" is an integer from 0 to 100."#
    )
}
