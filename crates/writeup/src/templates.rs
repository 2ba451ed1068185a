use serde::{Deserialize, Serialize};

/// Research field, inferred from detected domains, selecting the document
/// template. Checked in priority order: medical imaging, then genomics,
/// then machine learning; machine learning is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    MedicalImaging,
    Genomics,
    MachineLearning,
}

const MEDICAL_IMAGING_DOMAINS: &[&str] = &[
    "spatial-transcriptomics",
    "medical-imaging",
    "digital-pathology",
    "histology",
    "pathology",
    "microscopy",
];

const GENOMICS_DOMAINS: &[&str] = &[
    "genomics",
    "sequencing",
    "metagenomics",
    "rna-seq",
    "dna-seq",
    "single-cell",
];

const MACHINE_LEARNING_DOMAINS: &[&str] = &[
    "deep-learning",
    "machine-learning",
    "neural-networks",
    "computer-vision",
    "artificial-intelligence",
];

pub fn detect_field(domains: &[String]) -> Field {
    let lower: Vec<String> = domains.iter().map(|d| d.to_lowercase()).collect();
    let matches_any = |keywords: &[&str]| lower.iter().any(|d| keywords.contains(&d.as_str()));

    if matches_any(MEDICAL_IMAGING_DOMAINS) {
        Field::MedicalImaging
    } else if matches_any(GENOMICS_DOMAINS) {
        Field::Genomics
    } else if matches_any(MACHINE_LEARNING_DOMAINS) {
        Field::MachineLearning
    } else {
        Field::MachineLearning
    }
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::MedicalImaging => "medical_imaging",
            Field::Genomics => "genomics",
            Field::MachineLearning => "machine_learning",
        }
    }

    /// Document template for the field. Opaque template assets; only the
    /// placeholder names are load-bearing.
    pub fn template(&self) -> &'static str {
        match self {
            Field::MedicalImaging => MEDICAL_IMAGING_TEMPLATE,
            Field::Genomics => GENOMICS_TEMPLATE,
            Field::MachineLearning => MACHINE_LEARNING_TEMPLATE,
        }
    }
}

const MEDICAL_IMAGING_TEMPLATE: &str = r"\documentclass[journal]{IEEEtran}
\usepackage{graphicx}
\usepackage{amsmath}
\begin{document}
\title{{{TITLE}}}
\author{{{AUTHORS}}}
\maketitle
\begin{abstract}
{{ABSTRACT}}
\end{abstract}
{{INTRODUCTION}}
{{METHODS}}
{{RESULTS}}
{{DISCUSSION}}
{{BIBLIOGRAPHY}}
\end{document}
";

const GENOMICS_TEMPLATE: &str = r"\documentclass{article}
\usepackage{graphicx}
\usepackage{natbib}
\begin{document}
\title{{{TITLE}}}
\author{{{AUTHORS}}}
\maketitle
\begin{abstract}
{{ABSTRACT}}
\end{abstract}
{{INTRODUCTION}}
{{METHODS}}
{{RESULTS}}
{{DISCUSSION}}
{{BIBLIOGRAPHY}}
\end{document}
";

const MACHINE_LEARNING_TEMPLATE: &str = r"\documentclass{article}
\usepackage{graphicx}
\usepackage{booktabs}
\begin{document}
\title{{{TITLE}}}
\author{{{AUTHORS}}}
\maketitle
\begin{abstract}
{{ABSTRACT}}
\end{abstract}
{{INTRODUCTION}}
{{METHODS}}
{{RESULTS}}
{{DISCUSSION}}
{{BIBLIOGRAPHY}}
\end{document}
";
