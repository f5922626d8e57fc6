use async_trait::async_trait;
use regex::{Regex, RegexSet};

use super::{Classifier, ClassifyError};

pub const AI_ML_TOPIC: &str = "AI & ML";
pub const CYBERSECURITY_TOPIC: &str = "Cybersecurity & Privacy";
pub const CLOUD_DEVOPS_TOPIC: &str = "Cloud Computing & DevOps";
pub const SOFTWARE_DEV_TOPIC: &str = "Software Development & Web Technologies";
pub const DATA_SCIENCE_TOPIC: &str = "Data Science & Analytics";
pub const EMERGING_TECH_TOPIC: &str = "Emerging Technologies";
pub const BIG_TECH_TOPIC: &str = "Big Tech & Industry Trends";
pub const TECH_CULTURE_TOPIC: &str = "Tech Culture & Work";
pub const OPEN_SOURCE_TOPIC: &str = "Open Source";

pub const DEFAULT_TOPICS: [&str; 9] = [
    AI_ML_TOPIC,
    CYBERSECURITY_TOPIC,
    CLOUD_DEVOPS_TOPIC,
    SOFTWARE_DEV_TOPIC,
    DATA_SCIENCE_TOPIC,
    EMERGING_TECH_TOPIC,
    BIG_TECH_TOPIC,
    TECH_CULTURE_TOPIC,
    OPEN_SOURCE_TOPIC,
];

/// At least this many distinct technology keywords must appear
const MIN_TECH_KEYWORDS: usize = 2;

/// Two or more `$NN` mentions read as a sales pitch
const MAX_PRICE_MENTIONS: usize = 1;

const TECH_KEYWORDS: &[&str] = &[
    "technology", "tech", "software", "hardware", "artificial intelligence", "ai",
    "machine learning", "ml", "programming", "coding", "developer", "development",
    "computer", "computing", "digital", "internet", "web", "app", "application",
    "startup", "silicon valley", "google", "microsoft", "apple", "amazon", "meta",
    "facebook", "tesla", "nvidia", "cybersecurity", "security", "blockchain",
    "cryptocurrency", "bitcoin", "cloud", "data science", "analytics", "algorithm", "api",
    "database", "framework", "open source", "github", "linux", "windows", "android", "ios",
    "mobile", "smartphone", "robotics", "automation", "fintech", "saas", "platform",
    "virtual reality", "vr", "augmented reality", "quantum computing", "semiconductor",
    "chip", "processor", "server", "network", "wifi", "bluetooth", "device", "python",
    "javascript", "java", "react", "node", "typescript", "rust", "kubernetes", "docker",
    "aws", "azure", "gcp", "devops", "ci/cd", "bug", "release", "version", "update",
    "upgrade", "patch", "chatbot", "gpt", "llm", "neural", "model", "training", "dataset",
    "inference", "stackoverflow", "stack overflow", "code", "engineers", "engineering",
];

/// Non-technology signals; any match rejects
const REJECT_KEYWORDS: &[&str] = &[
    // adult
    "porn", "nsfw", "erotic", "escort", "xxx",
    // promotional
    "lifetime subscription", "lifetime access", "limited time offer", "special deal",
    "sale price", "reg. price", "half off", "promo code", "coupon", "deal of the day",
    "flash sale", "buy now", "order today", "trial offer", "binge-watching", "binge watch",
    "curiosity stream", "netflix", "hulu", "disney plus", "amazon prime video",
    "paramount plus", "hbo max", "peacock", "crunchyroll", "best deals", "buying guide",
    "act now", "don't miss out", "while supplies last", "last chance",
    // housing and policy
    "public housing", "housing policy", "income ceiling", "property prices",
    "mortgage rates", "real estate market", "affordable housing", "minister", "parliament",
    // sports
    "sports", "football", "basketball", "baseball", "soccer", "golf", "tennis", "hockey",
    "rugby", "cricket", "olympics", "fifa", "nfl", "nba", "athlete", "tournament",
    // health
    "hospital", "vaccine", "surgery", "prescription", "cancer", "diabetes",
    // lifestyle
    "parenting", "pregnancy", "wedding", "divorce", "dating", "toddler",
    // food
    "recipe", "cooking", "restaurant", "nutrition", "calories", "baking",
    // fashion
    "fashion", "makeup", "skincare", "outfit", "jewelry", "perfume",
    // politics
    "election", "republican", "democrat", "congress", "legislation",
    // religion
    "religion", "church", "prayer", "bible", "mosque", "worship",
    // travel
    "vacation", "tourism", "cruise", "resort", "sightseeing",
    // entertainment
    "celebrity", "concert", "album", "actress", "tv show",
    // weather
    "hurricane", "tornado", "wildfire", "weather forecast",
    // puzzles
    "wordle", "crossword", "sudoku", "nyt games", "game hints", "game answers",
    // farming and crafts
    "livestock", "harvest", "knitting", "pottery", "woodworking",
];

const PROMOTIONAL_PATTERNS: &[&str] = &[
    r"get .* for \$\d+",
    r"lifetime .* for \$\d+",
    r"reg\. \$\d+",
    r"half off.*price",
    r"tl;?dr:.*subscription",
    r"subscription.*plan.*off",
    r"save \$\d+",
    r"discount.*\$\d+",
    r"special.*offer.*\$\d+",
    r"minister.*says?",
    r"government.*policy",
    r"public.*housing.*policy",
];

const SECURITY_KEYWORDS: &[&str] = &[
    "security", "cybersecurity", "hack", "hacker", "hacked", "breach", "vulnerability",
    "exploit", "cve", "encryption", "privacy", "malware", "ransomware", "phishing",
    "zero-day", "firewall", "vpn", "authentication", "password", "two-factor", "tls",
    "pentest", "infosec", "threat", "cisa", "nist", "cryptography", "backdoor", "botnet",
    "spyware", "trojan", "rootkit", "cyberattack", "zero trust", "mfa", "xss", "csrf",
    "sql injection", "bug bounty", "incident response",
];

const CLOUD_KEYWORDS: &[&str] = &[
    "cloud", "aws", "azure", "gcp", "docker", "kubernetes", "devops", "ci/cd",
    "deployment", "infrastructure", "serverless", "microservices", "containerization",
    "orchestration", "terraform", "ansible", "helm", "istio", "cloudflare", "s3", "ec2",
    "lambda", "cloud native", "service mesh", "argo cd", "prometheus", "grafana",
    "observability", "pagerduty",
];

const OPEN_SOURCE_KEYWORDS: &[&str] = &[
    "open source", "open-source", "github", "gitlab", "linux", "ubuntu", "debian",
    "fedora", "red hat", "apache", "mozilla", "gnu", "gpl", "mit license", "pull request",
    "maintainer", "foss", "kde", "gnome", "freebsd", "openbsd",
];

const AI_KEYWORDS: &[&str] = &[
    "ai", "artificial intelligence", "machine learning", "ml", "neural network",
    "deep learning", "nlp", "computer vision", "tensorflow", "pytorch", "chatgpt", "llm",
    "gpt", "transformer", "openai", "anthropic", "claude", "gemini", "copilot", "chatbot",
    "robotics", "mistral", "llama", "stable diffusion", "midjourney", "large language model",
    "prompt engineering", "embedding", "inference",
];

const BIG_TECH_KEYWORDS: &[&str] = &[
    "google", "microsoft", "apple", "amazon", "meta", "facebook", "tesla", "nvidia",
    "intel", "amd", "samsung", "startup", "venture capital", "funding", "ipo",
    "acquisition", "merger", "silicon valley", "revenue", "unicorn", "series a",
    "series b", "bytedance", "tiktok", "alibaba", "huawei", "oracle", "ibm", "salesforce",
    "adobe",
];

const DEV_KEYWORDS: &[&str] = &[
    "programming", "coding", "developer", "software", "web development", "javascript",
    "python", "react", "node.js", "framework", "api", "frontend", "backend", "fullstack",
    "typescript", "angular", "vue", "php", "ruby", "java", "c++", "rust", "golang",
    "kotlin", "ios", "android", "swift", "flutter", "svelte", "next.js", "django",
    "flask", ".net", "c#", "compiler", "webassembly",
];

const DATA_KEYWORDS: &[&str] = &[
    "data science", "analytics", "big data", "database", "sql", "visualization",
    "statistics", "pandas", "numpy", "tableau", "power bi", "data mining", "etl",
    "data warehouse", "nosql", "mongodb", "postgresql", "mysql", "sqlite", "data lake",
    "data pipeline", "data engineer", "jupyter", "spark", "hadoop", "snowflake",
    "bigquery",
];

const CULTURE_KEYWORDS: &[&str] = &[
    "remote work", "work from home", "developer survey", "salary", "career", "hiring",
    "interview", "workplace", "burnout", "productivity", "diversity", "tech workers",
    "engineers", "stack overflow", "layoff", "layoffs", "onboarding", "work visa",
];

/// Rule-based classifier over technology keyword lists.
///
/// Rejects (returns the catch-all label) when the text carries any
/// non-technology signal, looks promotional, or mentions fewer than two
/// technology keywords. Otherwise the first matching topic group wins, in
/// priority order security, cloud, open source, AI, big tech, software,
/// data, culture; no group match gives "Emerging Technologies".
///
/// All matching is case-insensitive and on word boundaries.
pub struct KeywordClassifier {
    catch_all: String,
    tech: RegexSet,
    reject: RegexSet,
    promotional: RegexSet,
    price: Regex,
    percent_off: Regex,
    topics: Vec<(&'static str, RegexSet)>,
}

impl KeywordClassifier {
    pub fn new(catch_all: impl Into<String>) -> Result<Self, ClassifyError> {
        let topics = [
            (CYBERSECURITY_TOPIC, SECURITY_KEYWORDS),
            (CLOUD_DEVOPS_TOPIC, CLOUD_KEYWORDS),
            (OPEN_SOURCE_TOPIC, OPEN_SOURCE_KEYWORDS),
            (AI_ML_TOPIC, AI_KEYWORDS),
            (BIG_TECH_TOPIC, BIG_TECH_KEYWORDS),
            (SOFTWARE_DEV_TOPIC, DEV_KEYWORDS),
            (DATA_SCIENCE_TOPIC, DATA_KEYWORDS),
            (TECH_CULTURE_TOPIC, CULTURE_KEYWORDS),
        ]
        .into_iter()
        .map(|(topic, keywords)| Ok((topic, keyword_set(keywords)?)))
        .collect::<Result<Vec<_>, ClassifyError>>()?;

        Ok(Self {
            catch_all: catch_all.into(),
            tech: keyword_set(TECH_KEYWORDS)?,
            reject: keyword_set(REJECT_KEYWORDS)?,
            promotional: RegexSet::new(PROMOTIONAL_PATTERNS)?,
            price: Regex::new(r"\$\d+")?,
            percent_off: Regex::new(r"\d+%\s*off")?,
            topics,
        })
    }

    /// Synchronous core of [`Classifier::classify`]
    pub fn label(&self, title: &str, text: &str) -> String {
        let combined = format!("{title} {text}").to_lowercase();

        if self.reject.is_match(&combined) || self.promotional.is_match(&combined) {
            return self.catch_all.clone();
        }
        if self.price.find_iter(&combined).count() > MAX_PRICE_MENTIONS
            || self.percent_off.is_match(&combined)
        {
            return self.catch_all.clone();
        }
        if self.tech.matches(&combined).iter().count() < MIN_TECH_KEYWORDS {
            return self.catch_all.clone();
        }

        self.topics
            .iter()
            .find(|(_, set)| set.is_match(&combined))
            .map_or(EMERGING_TECH_TOPIC, |(topic, _)| *topic)
            .to_string()
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, title: &str, text: &str) -> Result<Option<String>, ClassifyError> {
        Ok(Some(self.label(title, text)))
    }
}

/// One pattern per keyword; `\b` only on edges that are word characters so
/// `c++` and `.net` still match.
fn keyword_set(keywords: &[&str]) -> Result<RegexSet, ClassifyError> {
    let patterns = keywords.iter().map(|kw| {
        let starts_word = kw.chars().next().is_some_and(|c| c.is_alphanumeric());
        let ends_word = kw.chars().last().is_some_and(|c| c.is_alphanumeric());
        format!(
            "{}{}{}",
            if starts_word { r"\b" } else { "" },
            regex::escape(kw),
            if ends_word { r"\b" } else { "" },
        )
    });
    Ok(RegexSet::new(patterns)?)
}
