// storefront_core/src/pricing.rs

//! Derived-price rules for line items and orders.
//!
//! Prices carry two decimal places and quantities three, with at most ten
//! significant digits each (the width of the backing `NUMERIC(10, _)` columns).

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{CoreError, CoreResult};

pub const PRICE_SCALE: u32 = 2;
pub const QUANTITY_SCALE: u32 = 3;
const MAX_DIGITS: u32 = 10;

/// Reported when a stored amount would not fit its column.
pub const AMOUNT_OUT_OF_RANGE: &str = "A derived price or order total is too large.";

/// `unit_price × quantity`, rounded half away from zero to cents.
pub fn line_price(unit_price: Decimal, quantity: Decimal) -> Decimal {
  (unit_price * quantity).round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum of line-item prices. An order without items totals zero.
pub fn order_total<I>(prices: I) -> Decimal
where
  I: IntoIterator<Item = Decimal>,
{
  let mut total: Decimal = prices.into_iter().sum();
  total.rescale(PRICE_SCALE);
  total
}

/// [`line_price`], refused when the result would not fit a stored price.
pub fn checked_line_price(unit_price: Decimal, quantity: Decimal) -> CoreResult<Decimal> {
  let price = line_price(unit_price, quantity);
  check_digits("Line price", price, PRICE_SCALE)?;
  Ok(price)
}

/// [`order_total`], refused when the sum would not fit a stored price.
pub fn checked_order_total<I>(prices: I) -> CoreResult<Decimal>
where
  I: IntoIterator<Item = Decimal>,
{
  let total = order_total(prices);
  check_digits("Order total", total, PRICE_SCALE)?;
  Ok(total)
}

pub fn validate_price(price: Decimal) -> CoreResult<()> {
  if price.is_sign_negative() && !price.is_zero() {
    return Err(CoreError::Validation("Price must not be negative.".to_string()));
  }
  check_digits("Price", price, PRICE_SCALE)
}

pub fn validate_quantity(quantity: Decimal) -> CoreResult<()> {
  if quantity <= Decimal::ZERO {
    return Err(CoreError::Validation("Quantity must be a positive number.".to_string()));
  }
  check_digits("Quantity", quantity, QUANTITY_SCALE)
}

fn check_digits(label: &str, value: Decimal, scale: u32) -> CoreResult<()> {
  let normalized = value.normalize();
  if normalized.scale() > scale {
    return Err(CoreError::Validation(format!(
      "{} must have no more than {} decimal places.",
      label, scale
    )));
  }
  let whole_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
  if whole_digits > MAX_DIGITS - scale {
    return Err(CoreError::Validation(format!(
      "{} must have no more than {} digits before the decimal point.",
      label,
      MAX_DIGITS - scale
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> Decimal {
    s.parse().unwrap()
  }

  #[test]
  fn line_price_multiplies_and_rounds_to_cents() {
    assert_eq!(line_price(d("10.00"), d("2")), d("20.00"));
    assert_eq!(line_price(d("5.00"), d("1.000")), d("5.00"));
    assert_eq!(line_price(d("0.99"), d("0.505")), d("0.50"));
    assert_eq!(line_price(d("3.33"), d("1.5")), d("5.00"));
    assert_eq!(line_price(d("10.00"), d("2")).scale(), 2);
  }

  #[test]
  fn order_total_sums_line_prices() {
    assert_eq!(order_total([d("20.00"), d("5.00")]), d("25.00"));
    assert_eq!(order_total(Vec::<Decimal>::new()), Decimal::ZERO);
    assert_eq!(order_total(Vec::<Decimal>::new()).scale(), 2);
  }

  #[test]
  fn derived_amounts_must_fit_a_stored_price() {
    assert_eq!(checked_line_price(d("10.00"), d("2")).unwrap(), d("20.00"));
    assert_eq!(checked_line_price(d("99999999.99"), d("1")).unwrap(), d("99999999.99"));
    assert!(checked_line_price(d("99999999.99"), d("9999999.999")).is_err());
    assert!(checked_line_price(d("50000000.00"), d("2")).is_err());

    assert_eq!(checked_order_total([d("60000000.00"), d("30000000.00")]).unwrap(), d("90000000.00"));
    assert!(checked_order_total([d("60000000.00"), d("40000000.00")]).is_err());
  }

  #[test]
  fn quantities_must_be_positive_with_three_decimals() {
    assert!(validate_quantity(d("1.125")).is_ok());
    assert!(validate_quantity(d("1.1250")).is_ok());
    assert!(validate_quantity(d("0")).is_err());
    assert!(validate_quantity(d("-1")).is_err());
    assert!(validate_quantity(d("0.0001")).is_err());
    assert!(validate_quantity(d("9999999.999")).is_ok());
    assert!(validate_quantity(d("10000000")).is_err());
  }

  #[test]
  fn prices_must_be_non_negative_with_two_decimals() {
    assert!(validate_price(d("0")).is_ok());
    assert!(validate_price(d("99999999.99")).is_ok());
    assert!(validate_price(d("100000000")).is_err());
    assert!(validate_price(d("-0.01")).is_err());
    assert!(validate_price(d("1.001")).is_err());
  }
}
