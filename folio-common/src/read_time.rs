//! Reading time estimate for post content.

use crate::model::post::ContentBlock;

pub const WORDS_PER_MINUTE: usize = 200;

/// Number of whitespace separated words in the block's body.
#[must_use]
pub fn word_count(block: &ContentBlock) -> usize {
    block.body_text().split_whitespace().count()
}

/// Estimated minutes to read `blocks`.
///
/// Each block is rounded up to a whole minute on its own and the results are summed, so two
/// short blocks cost two minutes even when their combined length fits in one.
#[must_use]
pub fn estimate(blocks: &[ContentBlock]) -> u32 {
    blocks
        .iter()
        .map(|block| minutes_for(word_count(block)))
        .sum()
}

fn minutes_for(words: usize) -> u32 {
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE)).unwrap_or(u32::MAX)
}
