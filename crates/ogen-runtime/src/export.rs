use anyhow::{anyhow, Context, Result};
use ogen_schemas::OrderResult;

const HEADER: [&str; 7] = [
    "order_index",
    "status",
    "remote_id",
    "order_number",
    "total_price",
    "tags",
    "message",
];

/// Render batch results as CSV, one row per order in result order.
pub fn results_to_csv(results: &[OrderResult]) -> Result<String> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(HEADER)?;
    for r in results {
        let idx = r.order_index().to_string();
        match r {
            OrderResult::Created(c) => w.write_record([
                idx.as_str(),
                "created",
                c.remote_id.as_str(),
                c.order_number.as_str(),
                c.total_price.as_str(),
                c.tags.as_str(),
                c.location_warning.as_deref().unwrap_or(""),
            ])?,
            OrderResult::Failed(f) => {
                w.write_record([idx.as_str(), "failed", "", "", "", "", f.message.as_str()])?
            }
        }
    }
    let bytes = w
        .into_inner()
        .map_err(|e| anyhow!("flush csv writer: {}", e.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogen_schemas::{CreatedOrder, FailedOrder};

    #[test]
    fn rows_follow_results() {
        let results = vec![
            OrderResult::Created(CreatedOrder {
                order_index: 1,
                remote_id: "5512".into(),
                order_number: "#1001".into(),
                total_price: "19.98".into(),
                tags: "qa-bulk, smoke".into(),
                financial_status: Some("paid".into()),
                fulfillment_status: None,
                created_at: None,
                location_warning: None,
            }),
            OrderResult::Failed(FailedOrder::new(2, "remote api error status=422: bad")),
        ];
        let csv = results_to_csv(&results).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "order_index,status,remote_id,order_number,total_price,tags,message"
        );
        assert_eq!(lines[1], "1,created,5512,#1001,19.98,\"qa-bulk, smoke\",");
        assert_eq!(lines[2], "2,failed,,,,,remote api error status=422: bad");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_results_is_header_only() {
        let csv = results_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
