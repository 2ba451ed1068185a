pub mod templates;

pub use templates::{detect_field, Field};

use anyhow::{Result, bail};
use regex::Regex;

use store::{DomainSynthesisRow, ManuscriptRow, RunMode, Section};

/// Render one manuscript section as LaTeX. Primary-research prose grounds
/// in the ingested finding JSON; review prose grounds in the run's domain
/// syntheses. Cross-references always use the non-breaking `~` join.
pub fn generate_section(
    section: Section,
    mode: RunMode,
    main_finding: Option<&serde_json::Value>,
    syntheses: &[DomainSynthesisRow],
) -> String {
    match mode {
        RunMode::PrimaryResearch => generate_primary_research_section(section, main_finding),
        RunMode::Review => generate_review_section(section, syntheses),
    }
}

fn section_header(section: Section) -> String {
    let name = section.as_str();
    let mut title = String::with_capacity(name.len());
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        title.extend(first.to_uppercase());
        title.push_str(chars.as_str());
    }
    format!("\\section{{{title}}}\n\n")
}

pub fn generate_primary_research_section(
    section: Section,
    main_finding: Option<&serde_json::Value>,
) -> String {
    let mut latex = section_header(section);

    match section {
        Section::Results => {
            if let Some(finding) = main_finding {
                latex.push_str("% Results grounded in experimental data\n");

                let key_findings = finding
                    .get("key_findings")
                    .and_then(|v| v.as_array())
                    .map(|v| v.as_slice())
                    .unwrap_or_default();
                for entry in key_findings {
                    let claim = entry.get("claim").and_then(|v| v.as_str()).unwrap_or("");
                    if claim.is_empty() {
                        continue;
                    }
                    let source = entry.get("source").and_then(|v| v.as_str()).unwrap_or("");
                    if source.is_empty() {
                        latex.push_str(&format!("{claim}.\n\n"));
                    } else {
                        latex.push_str(&format!("{claim} ({source}).\n\n"));
                    }
                }

                if !key_findings.is_empty() {
                    latex.push_str("Table~\\ref{tab:results} summarizes our key results.\n\n");
                }
                let has_figures = finding
                    .get("figures_catalog")
                    .and_then(|v| v.as_array())
                    .is_some_and(|v| !v.is_empty());
                if has_figures {
                    latex.push_str(
                        "Figure~\\ref{fig:results} shows the performance comparison.\n\n",
                    );
                }
            }
        }
        Section::Methods => {
            if main_finding.is_some() {
                latex.push_str("% Methods section\n");
                latex.push_str("We implemented our approach using standard techniques.\n\n");
            }
        }
        Section::Introduction => {
            latex.push_str("% Introduction section\n");
            latex.push_str("This work addresses an important problem in the field.\n\n");
        }
        Section::Discussion => {
            if main_finding.is_some() {
                latex.push_str("% Discussion section\n");
                latex.push_str("Our results demonstrate significant improvements.\n\n");
            }
        }
        Section::Abstract => {
            // The abstract body is dropped into \begin{abstract}, no header.
            latex = String::new();
            if main_finding.is_some() {
                latex.push_str("% Abstract\n");
                latex.push_str("This paper presents novel findings.\n\n");
            }
        }
    }

    latex
}

pub fn generate_review_section(section: Section, syntheses: &[DomainSynthesisRow]) -> String {
    let mut latex = section_header(section);

    match section {
        Section::Discussion => {
            if !syntheses.is_empty() {
                latex.push_str("% Discussion synthesized from literature\n");
                for synthesis in syntheses {
                    for body in key_findings_bodies(&synthesis.summary_markdown) {
                        latex.push_str(&body);
                        latex.push_str("\n\n");
                    }
                }
            }
        }
        Section::Introduction => {
            if !syntheses.is_empty() {
                latex.push_str("% Introduction synthesized from literature\n");
                latex.push_str("This review synthesizes recent advances in the field.\n\n");
            }
        }
        Section::Results => {
            if !syntheses.is_empty() {
                latex.push_str("% Results from literature synthesis\n");
                latex.push_str("We analyzed multiple studies across domains.\n\n");
            }
        }
        Section::Methods => {
            latex.push_str("% Review methodology\n");
            latex.push_str(
                "We systematically reviewed literature across multiple domains.\n\n",
            );
        }
        Section::Abstract => {
            latex = String::new();
            if !syntheses.is_empty() {
                latex.push_str("% Abstract\n");
                latex.push_str("This review surveys findings across domains.\n\n");
            }
        }
    }

    latex
}

/// Lift the "Key Findings" body out of a synthesis markdown document,
/// stripping bold/italic markers for LaTeX.
fn key_findings_bodies(markdown: &str) -> Vec<String> {
    let mut bodies = Vec::new();
    if !markdown.contains("## Key Finding") {
        return bodies;
    }
    for part in markdown.split("##") {
        if !part.contains("Key Finding") {
            continue;
        }
        if let Some((_header, body)) = part.split_once('\n') {
            let text = body.trim().replace("**", "").replace('*', "");
            if !text.is_empty() {
                bodies.push(text);
            }
        }
    }
    bodies
}

/// Assemble the full LaTeX document from stored sections. All five
/// sections must already be generated; empty strings are acceptable,
/// missing ones are not.
pub fn assemble_manuscript(
    manuscript: &ManuscriptRow,
    detected_domains: &[String],
    title: &str,
    authors: &str,
) -> Result<String> {
    for section in Section::ALL {
        if manuscript.section(section).is_none() {
            bail!("section '{}' has not been generated", section.as_str());
        }
    }

    let field = detect_field(detected_domains);
    let mut document = field.template().to_string();
    document = document.replace("{{TITLE}}", title);
    document = document.replace("{{AUTHORS}}", authors);
    for section in Section::ALL {
        let placeholder = format!("{{{{{}}}}}", section.as_str().to_uppercase());
        document = document.replace(&placeholder, manuscript.section(section).unwrap_or(""));
    }
    document = document.replace("{{BIBLIOGRAPHY}}", "");

    Ok(document)
}

/// LaTeX figure block. `wide` selects the double-column `figure*`
/// environment and `\textwidth` sizing.
pub fn generate_figure_block(
    filename: &str,
    caption: &str,
    label: &str,
    wide: bool,
    placement: &str,
) -> String {
    let env = if wide { "figure*" } else { "figure" };
    let width = if wide {
        r"0.95\textwidth"
    } else {
        r"0.95\columnwidth"
    };

    format!(
        "\\begin{{{env}}}[{placement}]\n\
         \\centering\n\
         \\includegraphics[width={width}]{{{filename}}}\n\
         \\caption{{{caption}}}\n\
         \\label{{{label}}}\n\
         \\end{{{env}}}\n"
    )
}

/// Lint figure placement and cross-reference spacing in LaTeX source.
/// Returns human-readable warnings, empty when the source is clean.
pub fn check_figure_placement(latex_source: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let bad_placement = Regex::new(r"\\begin\{figure\*?\}\[h!?\]").unwrap();
    let count = bad_placement.find_iter(latex_source).count();
    if count > 0 {
        warnings.push(format!(
            "Found {count} figure(s) with [h] placement. \
             Use [t!] or [b!] for professional typesetting."
        ));
    }

    // No negative lookahead in this regex engine: find every figure
    // environment and check the following byte by hand.
    let figure_env = Regex::new(r"\\begin\{figure\*?\}").unwrap();
    let missing = figure_env
        .find_iter(latex_source)
        .filter(|m| latex_source.as_bytes().get(m.end()) != Some(&b'['))
        .count();
    if missing > 0 {
        warnings.push(format!(
            "Found {missing} figure(s) without placement specifier. \
             Add [t!] or [b!] for better control."
        ));
    }

    let plain_space_ref = Regex::new(r"(Figure|Table)\s+\\ref").unwrap();
    let count = plain_space_ref.find_iter(latex_source).count();
    if count > 0 {
        warnings.push(format!(
            "Found {count} reference(s) without non-breaking space. \
             Use Figure~\\ref{{}} not Figure \\ref{{}}."
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finding_with_tables_and_figures() -> serde_json::Value {
        json!({
            "key_findings": [
                {
                    "claim": "Mean SSIM_Poisson: 0.605 (\u{b1}0.120)",
                    "stat": "SSIM_Poisson = 0.605",
                    "source": "tables/results.csv",
                },
                {
                    "claim": "Delta_SSIM positive in 3/4 cases (75.0%)",
                    "stat": "Delta_SSIM wins = 75.0%",
                    "source": "tables/results.csv",
                },
            ],
            "figures_catalog": [
                {"filename": "figures/main_result.png", "suggested_caption": "Main Result"},
            ],
            "constraints": ["All values must match results.csv exactly"],
        })
    }

    #[test]
    fn test_results_section_cites_findings_and_references() {
        let finding = finding_with_tables_and_figures();
        let latex =
            generate_primary_research_section(Section::Results, Some(&finding));

        assert!(latex.starts_with("\\section{Results}"));
        assert!(latex.contains("Mean SSIM_Poisson: 0.605"));
        assert!(latex.contains("(tables/results.csv)"));
        assert!(latex.contains("Table~\\ref{tab:results}"));
        assert!(latex.contains("Figure~\\ref{fig:results}"));
    }

    #[test]
    fn test_references_never_use_plain_space() {
        let finding = finding_with_tables_and_figures();
        for section in Section::ALL {
            let latex = generate_primary_research_section(section, Some(&finding));
            assert!(!latex.contains("Table \\ref"), "plain-space ref in {latex}");
            assert!(!latex.contains("Figure \\ref"), "plain-space ref in {latex}");
            assert!(check_figure_placement(&latex).is_empty());
        }
    }

    #[test]
    fn test_abstract_has_no_section_header() {
        let finding = finding_with_tables_and_figures();
        let latex = generate_primary_research_section(Section::Abstract, Some(&finding));
        assert!(!latex.contains("\\section"));
        assert!(latex.contains("This paper presents novel findings."));
    }

    #[test]
    fn test_review_discussion_lifts_key_findings() {
        let syntheses = vec![DomainSynthesisRow {
            synthesis_run_id: 1,
            domain_id: 1,
            domain_name: "loss-functions".into(),
            summary_markdown: "# Loss Functions: Domain Synthesis\n\n\
                ## Key Findings\n\n\
                - **Poisson loss** improves *sparse* reconstruction\n\n\
                ## Statistical Approaches\n\nNone.\n"
                .into(),
            papers_analyzed: 1,
            paper_ids: vec![1],
        }];

        let latex = generate_review_section(Section::Discussion, &syntheses);
        assert!(latex.contains("Poisson loss improves sparse reconstruction"));
        assert!(!latex.contains("**"));
        assert!(!latex.contains("Statistical Approaches"));
    }

    #[test]
    fn test_review_discussion_without_syntheses_is_header_only() {
        let latex = generate_review_section(Section::Discussion, &[]);
        assert_eq!(latex, "\\section{Discussion}\n\n");
    }

    #[test]
    fn test_assemble_requires_all_sections() {
        let manuscript = ManuscriptRow {
            synthesis_run_id: 1,
            abstract_text: Some("A.".into()),
            introduction: Some("I.".into()),
            methods: None,
            results: Some("R.".into()),
            discussion: Some("D.".into()),
            full_document: None,
        };
        let err = assemble_manuscript(&manuscript, &[], "T", "A").unwrap_err();
        assert!(err.to_string().contains("methods"));
    }

    #[test]
    fn test_assemble_substitutes_every_placeholder() {
        let manuscript = ManuscriptRow {
            synthesis_run_id: 1,
            abstract_text: Some("The abstract.".into()),
            introduction: Some("\\section{Introduction}\n\nIntro.".into()),
            methods: Some("".into()),
            results: Some("\\section{Results}\n\nResults.".into()),
            discussion: Some("\\section{Discussion}\n\nDiscussion.".into()),
            full_document: None,
        };
        let domains = vec!["spatial-transcriptomics".to_string()];
        let doc = assemble_manuscript(&manuscript, &domains, "Title", "Authors").unwrap();

        assert!(doc.contains("IEEEtran"));
        assert!(doc.contains("\\title{Title}"));
        assert!(doc.contains("The abstract."));
        assert!(!doc.contains("{{"));
    }

    #[test]
    fn test_figure_block_single_and_double_column() {
        let single = generate_figure_block("figs/a.png", "Cap", "fig:a", false, "t!");
        assert!(single.contains("\\begin{figure}[t!]"));
        assert!(single.contains(r"width=0.95\columnwidth"));

        let wide = generate_figure_block("figs/a.png", "Cap", "fig:a", true, "b!");
        assert!(wide.contains("\\begin{figure*}[b!]"));
        assert!(wide.contains(r"width=0.95\textwidth"));
        assert!(check_figure_placement(&wide).is_empty());
    }

    #[test]
    fn test_placement_lint_flags_all_three_issues() {
        let source = "\\begin{figure}[h!]\n\\end{figure}\n\
                      \\begin{figure*}\n\\end{figure*}\n\
                      See Figure \\ref{fig:x}.\n";
        let warnings = check_figure_placement(source);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("[h] placement"));
        assert!(warnings[1].contains("without placement specifier"));
        assert!(warnings[2].contains("non-breaking space"));
    }
}
