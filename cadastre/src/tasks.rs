use std::collections::BTreeMap;

/// Splits features into batches by their task label. Consecutive features with the same label
/// form one run, flushed when the label changes or the input ends. A label coming back later
/// starts a new run, which is appended after the earlier ones under the same key. Unlabeled
/// features are skipped and neither start nor break a run.
///
/// Input order is kept within every batch.
pub fn partition<'a, T, F>(items: &'a [T], label: F) -> BTreeMap<String, Vec<&'a T>>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut batches: BTreeMap<String, Vec<&'a T>> = BTreeMap::new();
    let mut runs = 0;
    let mut current: Option<&str> = None;
    let mut run: Vec<&'a T> = Vec::new();
    for item in items {
        let next = match label(item) {
            Some(l) if !l.is_empty() => l,
            _ => continue,
        };
        if let Some(last) = current {
            if last != next {
                batches
                    .entry(last.to_string())
                    .or_insert_with(Vec::new)
                    .append(&mut run);
                runs += 1;
            }
        }
        run.push(item);
        current = Some(next);
    }
    if let Some(last) = current {
        batches
            .entry(last.to_string())
            .or_insert_with(Vec::new)
            .append(&mut run);
        runs += 1;
    }
    debug!("Generated {} tasks from {} runs", batches.len(), runs);
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels<'a>(items: &'a [(usize, Option<&'a str>)]) -> BTreeMap<String, Vec<usize>> {
        partition(items, |x| x.1)
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().map(|x| x.0).collect()))
            .collect()
    }

    #[test]
    fn runs_and_reappearing_labels() {
        let items = vec![
            (0, Some("u00001")),
            (1, None),
            (2, Some("u00001")),
            (3, Some("r001")),
            (4, Some("")),
            (5, Some("u00001")),
        ];
        let batches = labels(&items);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches["u00001"], vec![0, 2, 5]);
        assert_eq!(batches["r001"], vec![3]);
    }

    #[test]
    fn nothing_labeled() {
        let items: Vec<(usize, Option<&str>)> = vec![(0, None), (1, None)];
        assert!(labels(&items).is_empty());
        assert!(labels(&[]).is_empty());
    }
}
