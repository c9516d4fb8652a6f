use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Canonical form of a user-supplied term: NFKC, trimmed, lowercase.
pub fn normalize_term(raw: &str) -> String {
	raw.nfkc().collect::<String>().trim().to_lowercase()
}

/// Lowercases and strips diacritics so "Reunión" and "reunion" compare equal.
pub fn fold(raw: &str) -> String {
	raw.nfd().filter(|ch| !is_combining_mark(*ch)).collect::<String>().to_lowercase()
}

/// Key used for `filter_counts` maps: the cleaned terms in request order, comma-joined.
pub fn terms_key<S>(terms: &[S]) -> String
where
	S: AsRef<str>,
{
	clean_terms(terms).join(",")
}

/// Normalized, deduplicated, non-empty terms in first-seen order.
pub fn clean_terms<S>(terms: &[S]) -> Vec<String>
where
	S: AsRef<str>,
{
	let mut out: Vec<String> = Vec::with_capacity(terms.len());

	for term in terms {
		let term = normalize_term(term.as_ref());

		if term.is_empty() || out.contains(&term) {
			continue;
		}

		out.push(term);
	}

	out
}
