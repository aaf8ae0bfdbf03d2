//! Pattern tables for field extraction, in priority order.

use std::sync::LazyLock;

use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("static extraction pattern"))
        .collect()
}

/// Separator-delimited day, month, four-digit year.
const DATE: &str = r"[0-9]{1,2}[-/.][0-9]{1,2}[-/.][0-9]{4}";

/// Free text run that labeled place/address values are captured from.
const FREE_TEXT: &str = r"([a-zA-Z0-9\s,.-]+?)";

/// Ends a short labeled value.
const SHORT_END: &str = r"(?:[,.]|\n|$)";

/// Ends an address block.
const ADDRESS_END: &str = r"(?:\n|contact|phone|mobile)";

const SALARY_UNIT: &str = r"(?:lakhs?|lpa|k|crores?|thousands?)";

const CITIES: &[&str] = &[
    "hyderabad", "bangalore", "chennai", "mumbai", "delhi", "pune", "kolkata", "ahmedabad",
    "surat", "jaipur", "lucknow", "kanpur", "nagpur", "visakhapatnam", "indore", "thane",
    "bhopal", "patna", "vadodara", "ghaziabad", "ludhiana", "agra", "nashik", "faridabad",
    "meerut", "rajkot", "kalyan", "vasai", "varanasi", "srinagar", "aurangabad", "dhanbad",
    "amritsar", "navi mumbai", "allahabad", "ranchi", "howrah", "coimbatore", "jabalpur",
    "gwalior", "vijayawada", "jodhpur", "madurai", "raipur", "kota", "guwahati", "chandigarh",
    "solapur", "hubli", "tiruchirappalli", "bareilly", "mysore", "tiruppur", "gurgaon",
    "aligarh", "jalandhar", "bhubaneswar", "salem", "warangal", "guntur", "bhiwandi",
    "saharanpur", "gorakhpur", "bikaner", "amravati", "noida", "jamshedpur", "bhilai",
    "cuttack", "firozabad", "kochi", "nellore", "bhavnagar", "dehradun", "durgapur", "asansol",
    "rourkela", "nanded", "kolhapur", "ajmer", "akola", "gulbarga", "jamnagar", "ujjain",
    "loni", "siliguri", "jhansi", "ulhasnagar", "jammu", "sangli", "miraj", "kupwad",
    "belgaum", "mangalore", "ambattur", "tirunelveli", "malegaon", "gaya", "jalgaon",
    "udaipur", "maheshtala",
];

pub(crate) static DATE_OF_BIRTH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let patterns = [
        format!(r"date\s*of\s*birth[:\s]*({})", DATE),
        format!(r"dob[:\s]*({})", DATE),
        format!(r"birth[:\s]*({})", DATE),
        format!(r"born[:\s]*({})", DATE),
        r"([0-9]{1,2}[-/.][0-9]{1,2}[-/.]19[0-9]{2})".to_string(),
        r"([0-9]{1,2}[-/.][0-9]{1,2}[-/.]20[0-9]{2})".to_string(),
        r"([0-9]{1,2}\s*[-/.]\s*[0-9]{1,2}\s*[-/.]\s*[0-9]{4})".to_string(),
    ];
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    compile(&refs)
});

pub(crate) static OCCUPATION_PLACE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let labeled = [
        r"working\s+(?:at|in|for)\s+",
        r"company[:\s]*",
        r"organization[:\s]*",
        r"employer[:\s]*",
        r"occupation[:\s]*",
        r"job[:\s]*",
        r"profession[:\s]*",
        r"place\s*of\s*work[:\s]*",
        r"current\s*location[:\s]*",
    ];
    let mut patterns: Vec<String> = labeled
        .iter()
        .map(|label| format!("{}{}{}", label, FREE_TEXT, SHORT_END))
        .collect();
    patterns.push(format!(r"\b({})(?:\s|,|\.|$)", CITIES.join("|")));

    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    compile(&refs)
});

pub(crate) static NATIVE_ADDRESS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let patterns = [
        format!(r"native[:\s]*{}{}", FREE_TEXT, SHORT_END),
        format!(r"native\s*place[:\s]*{}{}", FREE_TEXT, SHORT_END),
        format!(r"home\s*town[:\s]*{}{}", FREE_TEXT, SHORT_END),
        format!(r"birth\s*place[:\s]*{}{}", FREE_TEXT, SHORT_END),
        format!(r"place\s*of\s*birth[:\s]*{}{}", FREE_TEXT, SHORT_END),
        format!(r"residential\s*address[:\s]*{}{}", FREE_TEXT, ADDRESS_END),
        format!(r"permanent\s*address[:\s]*{}{}", FREE_TEXT, ADDRESS_END),
        format!(r"address[:\s]*{}{}", FREE_TEXT, ADDRESS_END),
        format!(r"settled\s*(?:in|at)[:\s]*{}{}", FREE_TEXT, SHORT_END),
    ];
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    compile(&refs)
});

pub(crate) static SALARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let amount = r"(\d+(?:\.\d+)?)";
    let patterns = [
        format!(r"salary[:\s]*{}\s*{}", amount, SALARY_UNIT),
        format!(r"income[:\s]*{}\s*{}", amount, SALARY_UNIT),
        format!(r"package[:\s]*{}\s*{}", amount, SALARY_UNIT),
        format!(
            r"annual\s*(?:income|salary|package)[:\s]*{}\s*{}",
            amount, SALARY_UNIT
        ),
        format!(r"ctc[:\s]*{}\s*{}", amount, SALARY_UNIT),
        format!(
            r"{}\s*(?:lakhs?|lpa|k|crores?)\s*(?:per\s*annum|pa|annually)",
            amount
        ),
        format!(r"earning[:\s]*{}\s*{}", amount, SALARY_UNIT),
        r"\$\s*(\d+(?:,\d{3})*(?:\.\d+)?)\s*(?:k|thousand|per\s*year|annually)?".to_string(),
        format!(r"{}\s*(?:thousand|k)\s*(?:usd|dollars?|per\s*month)", amount),
    ];
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    compile(&refs)
});
