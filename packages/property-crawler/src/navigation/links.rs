//! Outbound link filtering and prioritization.

use std::collections::HashSet;
use url::Url;

use crate::config::LinkPolicy;
use crate::text::fold;
use crate::types::{NavigationState, PriorityClass};
use crate::urls::{host_key, normalize_url, same_host};

pub struct LinkFilter {
    policy: LinkPolicy,
    max_depth: usize,
}

impl LinkFilter {
    pub fn new(policy: LinkPolicy, max_depth: usize) -> Self {
        Self { policy, max_depth }
    }

    /// Priority from path keywords and a trailing numeric identifier.
    pub fn priority(&self, url: &Url) -> PriorityClass {
        let path = fold(&url.path().to_ascii_lowercase());

        if has_numeric_id_suffix(url)
            || self
                .policy
                .high_priority_keywords
                .iter()
                .any(|k| path.contains(k.as_str()))
        {
            return PriorityClass::High;
        }
        if self
            .policy
            .low_priority_keywords
            .iter()
            .any(|k| path.contains(k.as_str()))
        {
            return PriorityClass::Low;
        }
        PriorityClass::Normal
    }

    /// Normalized link if it passes the pre-classification filters.
    pub fn accept(&self, page: &Url, link: &Url) -> Option<Url> {
        let scheme = link.scheme().to_ascii_lowercase();
        if self.policy.skip_schemes.iter().any(|s| *s == scheme) {
            return None;
        }
        if scheme != "http" && scheme != "https" {
            return None;
        }

        let host = host_key(link);
        if self
            .policy
            .social_hosts
            .iter()
            .any(|social| host == *social || host.ends_with(&format!(".{social}")))
        {
            return None;
        }
        if !same_host(page, link) {
            return None;
        }
        if self.has_skipped_extension(link) {
            return None;
        }

        normalize_url(link).ok()
    }

    /// Children of a page at `depth`: filtered, deduplicated, ordered by
    /// priority and cut to the depth budget.
    pub fn select(&self, page: &Url, depth: usize, links: &[Url]) -> Vec<NavigationState> {
        let child_depth = depth + 1;
        if child_depth > self.max_depth {
            return Vec::new();
        }

        let page_key = normalize_url(page).map(|u| u.to_string()).ok();
        let mut seen = HashSet::new();
        let mut children: Vec<NavigationState> = links
            .iter()
            .filter_map(|link| self.accept(page, link))
            .filter(|url| page_key.as_deref() != Some(url.as_str()))
            .filter(|url| seen.insert(url.to_string()))
            .map(|url| NavigationState {
                priority: self.priority(&url),
                url,
                depth: child_depth,
            })
            .filter(|child| {
                !(depth >= self.policy.low_priority_drop_depth && child.priority == PriorityClass::Low)
            })
            .collect();

        // Stable: document order is kept within a priority class
        children.sort_by_key(|child| child.priority);
        children.truncate(self.policy.budget_for_depth(depth));
        children
    }

    fn has_skipped_extension(&self, url: &Url) -> bool {
        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        match last.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.policy.skip_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

fn has_numeric_id_suffix(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("");
    let stem = last.split('.').next().unwrap_or(last);
    let trailing_digits = stem.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    trailing_digits >= 3 || (trailing_digits > 0 && trailing_digits == stem.len())
}
