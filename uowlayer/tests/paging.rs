mod common;

use common::{Invoice, ids, seeded};
use uowlayer::prelude::*;

fn by_id() -> Sort {
    Sort::ascending("_id")
}

#[tokio::test]
async fn aggregated_pages_slice_in_sort_order() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let first = invoices
        .get_paged(PaginationParams::new(0, 10), &Filter::all(), &by_id(), None)
        .await
        .unwrap();
    let last = invoices
        .get_paged(PaginationParams::new(2, 10), &Filter::all(), &by_id(), None)
        .await
        .unwrap();

    assert_eq!(ids(&first.items), (1..=10).collect::<Vec<_>>());
    assert_eq!(first.total_count, 25);
    assert_eq!(first.total_pages, 3);
    assert!(!first.has_previous_page());
    assert!(first.has_next_page());

    assert_eq!(ids(&last.items), vec![21, 22, 23, 24, 25]);
    assert_eq!(last.total_pages, 3);
    assert!(!last.has_next_page());
}

#[tokio::test]
async fn pages_past_the_end_are_empty_with_correct_totals() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let aggregated = invoices
        .get_paged(PaginationParams::new(9, 10), &Filter::all(), &by_id(), None)
        .await
        .unwrap();
    let drained = invoices
        .get_paged_by_cursor(PaginationParams::new(9, 10), &Filter::all(), Some(&by_id()), None)
        .await
        .unwrap();

    for page in [aggregated, drained] {
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_index, 9);
    }
}

#[tokio::test]
async fn both_strategies_return_the_same_pages() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();
    let sort = Sort::descending("total");

    for page_index in 0..3 {
        let params = PaginationParams::new(page_index, 10);

        let aggregated = invoices
            .get_paged(params, &Filter::all(), &sort, None)
            .await
            .unwrap();
        let drained = invoices
            .get_paged_by_cursor(params, &Filter::all(), Some(&sort), None)
            .await
            .unwrap();

        assert_eq!(aggregated, drained);
    }
}

#[tokio::test]
async fn walking_every_page_yields_each_document_once() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let mut seen = Vec::new();
    let mut params = PaginationParams::new(0, 7);
    loop {
        let page = invoices
            .get_paged(params, &Filter::all(), &by_id(), None)
            .await
            .unwrap();
        seen.extend(ids(&page.items));

        if !page.has_next_page() {
            break;
        }
        params.page_index += 1;
    }

    assert_eq!(seen, (1..=25).collect::<Vec<_>>());
}

#[tokio::test]
async fn filters_narrow_the_total_count() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let page = invoices
        .get_paged(
            PaginationParams::new(0, 10),
            &Filter::gt("total", 200_i64),
            &by_id(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec![21, 22, 23, 24, 25]);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn cursor_paging_without_sort_keeps_insertion_order() {
    let unit_of_work = seeded(12).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let page = invoices
        .get_paged_by_cursor(PaginationParams::from_page_number(2, 5), &Filter::all(), None, None)
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec![6, 7, 8, 9, 10]);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
    let unit_of_work = seeded(3).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let aggregated = invoices
        .get_paged(PaginationParams::new(0, 0), &Filter::all(), &by_id(), None)
        .await;
    let drained = invoices
        .get_paged_by_cursor(PaginationParams::new(0, 0), &Filter::all(), None, None)
        .await;

    assert!(matches!(aggregated, Err(UnitOfWorkError::InvalidArgument(_))));
    assert!(matches!(drained, Err(UnitOfWorkError::InvalidArgument(_))));
}

#[tokio::test]
async fn aggregated_paging_requires_a_sort() {
    let unit_of_work = seeded(3).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let result = invoices
        .get_paged(PaginationParams::new(0, 10), &Filter::all(), &Sort::default(), None)
        .await;

    assert!(matches!(result, Err(UnitOfWorkError::InvalidArgument(_))));
}

#[tokio::test]
async fn paged_lists_convert_items_and_keep_metadata() {
    let unit_of_work = seeded(25).await;
    let invoices = unit_of_work.get_repository::<Invoice>().await.unwrap();

    let page = invoices
        .get_paged(PaginationParams::new(1, 10), &Filter::all(), &by_id(), None)
        .await
        .unwrap()
        .map(|invoice| invoice.customer);

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0], "customer-2");
    assert_eq!(page.page_index, 1);
    assert_eq!(page.total_count, 25);
}
