//! One-item-at-a-time review progression over a delivered order.

use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{LineItem, OrderStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("order is {0}, only delivered orders can be reviewed")]
    NotDelivered(OrderStatus),
    #[error("every item of this order has already been reviewed")]
    AlreadyCompleted,
    #[error("item {submitted} is not next for review, expected item {expected}")]
    OutOfOrder { expected: usize, submitted: usize },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),
    #[error("cannot resolve the product of item {index} ('{item_id}')")]
    UnresolvableProduct { index: usize, item_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i32) -> Result<Self, ReviewError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(ReviewError::InvalidRating(value)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewStep<'a> {
    Next {
        index: usize,
        item: &'a LineItem,
        product_id: Uuid,
    },
    Completed,
}

/// Finds the first line item without a review.
pub fn next_step<'a>(
    status: OrderStatus,
    items: &'a [LineItem],
    reviewed: &BTreeSet<usize>,
) -> Result<ReviewStep<'a>, ReviewError> {
    if status != OrderStatus::Delivered {
        return Err(ReviewError::NotDelivered(status));
    }

    let Some((index, item)) = items
        .iter()
        .enumerate()
        .find(|(index, _)| !reviewed.contains(index))
    else {
        return Ok(ReviewStep::Completed);
    };

    let product_id = item
        .product_id()
        .ok_or_else(|| ReviewError::UnresolvableProduct {
            index,
            item_id: item.item_id.clone(),
        })?;

    Ok(ReviewStep::Next {
        index,
        item,
        product_id,
    })
}

/// Validates a submission against the current step and returns the item
/// being reviewed together with its product.
pub fn accept_submission<'a>(
    status: OrderStatus,
    items: &'a [LineItem],
    reviewed: &BTreeSet<usize>,
    submitted_index: usize,
    rating: i32,
) -> Result<(usize, &'a LineItem, Uuid, Rating), ReviewError> {
    let rating = Rating::new(rating)?;
    match next_step(status, items, reviewed)? {
        ReviewStep::Completed => Err(ReviewError::AlreadyCompleted),
        ReviewStep::Next {
            index,
            item,
            product_id,
        } => {
            if index != submitted_index {
                return Err(ReviewError::OutOfOrder {
                    expected: index,
                    submitted: submitted_index,
                });
            }
            Ok((index, item, product_id, rating))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<LineItem> {
        (0..n)
            .map(|i| LineItem {
                item_id: LineItem::compose_item_id(Uuid::new_v4(), Some(Uuid::new_v4())),
                name: format!("item {i}"),
                price: 100,
                quantity: 1,
                variant: None,
            })
            .collect()
    }

    #[test]
    fn walks_every_item_in_array_order_exactly_once() {
        let items = items(4);
        let mut reviewed = BTreeSet::new();
        let mut visited = Vec::new();

        loop {
            match next_step(OrderStatus::Delivered, &items, &reviewed).unwrap() {
                ReviewStep::Completed => break,
                ReviewStep::Next { index, .. } => {
                    let (accepted, ..) =
                        accept_submission(OrderStatus::Delivered, &items, &reviewed, index, 5)
                            .unwrap();
                    visited.push(accepted);
                    reviewed.insert(accepted);
                }
            }
        }

        assert_eq!(visited, vec![0, 1, 2, 3]);
        assert_eq!(
            accept_submission(OrderStatus::Delivered, &items, &reviewed, 3, 4),
            Err(ReviewError::AlreadyCompleted)
        );
    }

    #[test]
    fn duplicate_or_skipped_items_are_refused() {
        let items = items(3);
        let reviewed: BTreeSet<usize> = [0].into_iter().collect();
        assert_eq!(
            accept_submission(OrderStatus::Delivered, &items, &reviewed, 0, 4),
            Err(ReviewError::OutOfOrder {
                expected: 1,
                submitted: 0
            })
        );
        assert_eq!(
            accept_submission(OrderStatus::Delivered, &items, &reviewed, 2, 4),
            Err(ReviewError::OutOfOrder {
                expected: 1,
                submitted: 2
            })
        );
    }

    #[test]
    fn only_delivered_orders_are_reviewable() {
        let items = items(1);
        assert_eq!(
            next_step(OrderStatus::Shipped, &items, &BTreeSet::new()),
            Err(ReviewError::NotDelivered(OrderStatus::Shipped))
        );
    }

    #[test]
    fn rating_is_required_in_range() {
        let items = items(1);
        for bad in [0, 6, -1] {
            assert_eq!(
                accept_submission(OrderStatus::Delivered, &items, &BTreeSet::new(), 0, bad),
                Err(ReviewError::InvalidRating(bad))
            );
        }
        assert_eq!(Rating::new(5).map(Rating::value), Ok(5));
    }

    #[test]
    fn unresolvable_item_halts_the_flow() {
        let mut items = items(2);
        items[1].item_id = "not-a-product".into();
        let reviewed: BTreeSet<usize> = [0].into_iter().collect();
        assert_eq!(
            next_step(OrderStatus::Delivered, &items, &reviewed),
            Err(ReviewError::UnresolvableProduct {
                index: 1,
                item_id: "not-a-product".into()
            })
        );
    }
}
